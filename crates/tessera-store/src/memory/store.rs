use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwap;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::store::Store;

use super::transaction::MemoryTransaction;

pub(crate) type ColumnFamily = OrdMap<Vec<u8>, Vec<u8>>;

type CfTable = HashMap<String, Arc<ArcSwap<ColumnFamily>>>;

/// In-process store backed by persistent ordered maps.
///
/// Readers never block: a transaction snapshots the column families it touches
/// (cheap thanks to imbl structural sharing) and commit swaps the new maps in.
/// Write transactions are serialized by `write_lock`.
pub struct MemoryStore {
    cfs: RwLock<CfTable>,
    write_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            cfs: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Snapshot a single column family, or `None` if it does not exist.
    pub(crate) fn snapshot_cf(&self, name: &str) -> Result<Option<Arc<ColumnFamily>>, StoreError> {
        let cfs = self.read_table()?;
        Ok(cfs.get(name).map(|arc| arc.load_full()))
    }

    /// Publish the dirty column families of a committed transaction.
    pub(crate) fn commit(
        &self,
        dirty: HashMap<String, Arc<ColumnFamily>>,
        dropped: HashSet<String>,
    ) -> Result<(), StoreError> {
        let mut cfs = self
            .cfs
            .write()
            .map_err(|e| StoreError::Storage(format!("catalog lock poisoned: {e}")))?;
        for name in dropped {
            cfs.remove(&name);
        }
        for (name, data) in dirty {
            match cfs.get(&name) {
                Some(arc) => arc.store(data),
                None => {
                    cfs.insert(name, Arc::new(ArcSwap::new(data)));
                }
            }
        }
        Ok(())
    }

    fn read_table(&self) -> Result<std::sync::RwLockReadGuard<'_, CfTable>, StoreError> {
        self.cfs
            .read()
            .map_err(|e| StoreError::Storage(format!("catalog lock poisoned: {e}")))
    }
}

impl Store for MemoryStore {
    type Txn<'a> = MemoryTransaction<'a>;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        if read_only {
            return Ok(MemoryTransaction::new_read_only(self));
        }
        let guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        Ok(MemoryTransaction::new_writable(self, guard))
    }

    fn create_cf(&self, name: &str) -> Result<(), StoreError> {
        let mut cfs = self
            .cfs
            .write()
            .map_err(|e| StoreError::Storage(format!("catalog lock poisoned: {e}")))?;
        cfs.entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::new(Arc::new(OrdMap::new()))));
        Ok(())
    }

    fn drop_cf(&self, name: &str) -> Result<(), StoreError> {
        let mut cfs = self
            .cfs
            .write()
            .map_err(|e| StoreError::Storage(format!("catalog lock poisoned: {e}")))?;
        cfs.remove(name);
        Ok(())
    }
}
