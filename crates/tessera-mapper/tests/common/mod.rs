#![allow(dead_code)]

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tessera_mapper::{Collection, DatabaseConfig, Identifiable, Mapper};
use tessera_store::MemoryStore;

pub const FRIENDS: &str = "friends";

pub fn mapper() -> Mapper<MemoryStore> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Mapper::in_memory(DatabaseConfig::default()).unwrap()
}

/// A fresh mapper and an empty `friends` collection.
pub fn friends() -> (Mapper<MemoryStore>, Collection<MemoryStore>) {
    let mapper = mapper();
    let collection = mapper.collection(FRIENDS);
    (mapper, collection)
}

// ── Fixtures ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Friend {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            address: None,
        }
    }

    pub fn with_id(id: ObjectId, name: &str) -> Self {
        Self {
            id: Some(id),
            ..Self::new(name)
        }
    }
}

impl Identifiable for Friend {
    fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

/// Friend keyed by an id owned by another system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalFriend {
    #[serde(rename = "_id")]
    pub id: i32,
    pub name: String,
}

impl ExternalFriend {
    pub fn new(id: i32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: i32,
    pub lng: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bean {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub key: String,
    pub sub_bean: SubBean,
}

impl Identifiable for Bean {
    fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubBean {
    pub value: String,
}

impl SubBean {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}
