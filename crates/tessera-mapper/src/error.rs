use bson::Bson;
use tessera_db::DbError;
use tessera_query::TemplateError;

#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    #[error("duplicate key error collection: {collection} dup key: {{ _id: {key} }}")]
    DuplicateKey { collection: String, key: Bson },
    #[error("invalid query template: {0}")]
    Template(#[from] TemplateError),
    #[error("unable to marshall parameter #{index}: {message}")]
    Parameter { index: usize, message: String },
    #[error("unable to marshall object: {0}")]
    Marshal(#[source] bson::error::Error),
    #[error("unable to unmarshall document: {0}")]
    Unmarshal(#[source] bson::error::Error),
    #[error(transparent)]
    Db(DbError),
}

impl MapperError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, MapperError::DuplicateKey { .. })
    }
}

impl From<DbError> for MapperError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::DuplicateKey { collection, key } => {
                MapperError::DuplicateKey { collection, key }
            }
            other => MapperError::Db(other),
        }
    }
}
