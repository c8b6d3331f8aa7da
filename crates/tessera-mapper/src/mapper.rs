use std::sync::Arc;

use tessera_db::Database;
use tessera_store::Store;

use crate::collection::Collection;
use crate::error::MapperError;

/// Entry point: hands out [`Collection`] handles over one database.
pub struct Mapper<S: Store> {
    db: Arc<Database<S>>,
}

impl<S: Store> Mapper<S> {
    pub fn new(db: Database<S>) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn from_shared(db: Arc<Database<S>>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database<S>> {
        &self.db
    }

    pub fn collection(&self, name: &str) -> Collection<S> {
        Collection::new(Arc::clone(&self.db), name)
    }

    pub fn collection_names(&self) -> Result<Vec<String>, MapperError> {
        Ok(self.db.list_collections()?)
    }
}

impl<S: Store> Clone for Mapper<S> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

#[cfg(feature = "memory")]
impl Mapper<tessera_store::MemoryStore> {
    /// A mapper over a fresh in-memory database.
    pub fn in_memory(config: tessera_db::DatabaseConfig) -> Result<Self, MapperError> {
        let db = Database::open(tessera_store::MemoryStore::new(), config)?;
        Ok(Self::new(db))
    }
}
