use bson::Bson;
use tessera_query::{FilterParseError, FindOptionsError, MutationError};
use tessera_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("duplicate key error collection: {collection} index: _id_ dup key: {{ _id: {key} }}")]
    DuplicateKey { collection: String, key: Bson },
    #[error("invalid _id: {0}")]
    InvalidId(String),
    #[error("invalid collection name: {0:?}")]
    InvalidCollectionName(String),
    #[error("invalid write concern: {0}")]
    InvalidWriteConcern(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Filter(#[from] FilterParseError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    FindOptions(#[from] FindOptionsError),
    #[error("serialization error: {0}")]
    Serialization(#[from] bson::error::Error),
}

impl DbError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, DbError::DuplicateKey { .. })
    }
}
