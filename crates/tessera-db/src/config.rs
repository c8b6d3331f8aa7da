use serde::Deserialize;

use crate::concern::WriteConcern;
use crate::error::DbError;

const WRITE_CONCERN_VAR: &str = "TESSERA_WRITE_CONCERN";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    /// Concern applied to writes issued without an explicit one.
    #[serde(default)]
    pub write_concern: WriteConcern,
}

impl DatabaseConfig {
    /// Defaults, overridden by `TESSERA_WRITE_CONCERN` when set.
    pub fn from_env() -> Result<Self, DbError> {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(WRITE_CONCERN_VAR) {
            config.write_concern = value
                .parse()
                .map_err(|e| DbError::Config(format!("{WRITE_CONCERN_VAR}: {e}")))?;
        }
        config.write_concern.validate()?;
        Ok(config)
    }
}
