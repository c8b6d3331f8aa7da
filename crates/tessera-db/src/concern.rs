use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::error::DbError;

/// How many members must acknowledge a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acknowledgment {
    Nodes(u32),
    Majority,
}

/// Acknowledgment level requested for a write.
///
/// The embedded database has a single member, so every acknowledged level
/// behaves the same once validated; the concern is still carried through to
/// the [`WriteResult`] so callers can see what was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConcern {
    pub w: Acknowledgment,
    #[serde(default)]
    pub journal: bool,
    #[serde(default)]
    pub wtimeout_ms: Option<u64>,
}

impl WriteConcern {
    /// Fire and forget: failures are not reported.
    pub const UNACKNOWLEDGED: Self = Self::nodes(0);
    pub const ACKNOWLEDGED: Self = Self::nodes(1);
    /// Alias of [`WriteConcern::ACKNOWLEDGED`].
    pub const SAFE: Self = Self::ACKNOWLEDGED;
    pub const JOURNALED: Self = Self {
        w: Acknowledgment::Nodes(1),
        journal: true,
        wtimeout_ms: None,
    };
    pub const MAJORITY: Self = Self {
        w: Acknowledgment::Majority,
        journal: false,
        wtimeout_ms: None,
    };

    pub const fn nodes(n: u32) -> Self {
        Self {
            w: Acknowledgment::Nodes(n),
            journal: false,
            wtimeout_ms: None,
        }
    }

    pub fn with_journal(mut self, journal: bool) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_wtimeout(mut self, timeout: Duration) -> Self {
        self.wtimeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn is_acknowledged(&self) -> bool {
        !matches!(self.w, Acknowledgment::Nodes(0))
    }

    pub fn validate(&self) -> Result<(), DbError> {
        if !self.is_acknowledged() && self.journal {
            return Err(DbError::InvalidWriteConcern(
                "w: 0 cannot be combined with journal: true".into(),
            ));
        }
        Ok(())
    }
}

impl Default for WriteConcern {
    fn default() -> Self {
        Self::ACKNOWLEDGED
    }
}

impl fmt::Display for WriteConcern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.w {
            Acknowledgment::Nodes(n) => write!(f, "{{ w: {n}")?,
            Acknowledgment::Majority => write!(f, "{{ w: \"majority\"")?,
        }
        if self.journal {
            write!(f, ", j: true")?;
        }
        if let Some(ms) = self.wtimeout_ms {
            write!(f, ", wtimeout: {ms}")?;
        }
        write!(f, " }}")
    }
}

impl FromStr for WriteConcern {
    type Err = DbError;

    /// Accepts the level names (`unacknowledged`, `acknowledged`, `safe`,
    /// `journaled`, `majority`) or a node count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unacknowledged" | "none" => Ok(Self::UNACKNOWLEDGED),
            "acknowledged" | "safe" => Ok(Self::ACKNOWLEDGED),
            "journaled" | "journal_safe" => Ok(Self::JOURNALED),
            "majority" => Ok(Self::MAJORITY),
            other => other
                .parse::<u32>()
                .map(Self::nodes)
                .map_err(|_| DbError::InvalidWriteConcern(format!("unknown write concern '{s}'"))),
        }
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResult {
    /// Documents inserted, matched by an update (1 for an upsert) or removed.
    pub n: u64,
    pub updated_existing: bool,
    pub upserted_id: Option<Bson>,
    pub inserted_ids: Vec<Bson>,
    /// Concern the write was issued with.
    pub last_concern: WriteConcern,
    pub acknowledged: bool,
}

impl WriteResult {
    pub(crate) fn acknowledged(concern: WriteConcern) -> Self {
        Self {
            n: 0,
            updated_existing: false,
            upserted_id: None,
            inserted_ids: Vec::new(),
            last_concern: concern,
            acknowledged: true,
        }
    }

    pub(crate) fn unacknowledged(concern: WriteConcern) -> Self {
        Self {
            acknowledged: false,
            ..Self::acknowledged(concern)
        }
    }
}
