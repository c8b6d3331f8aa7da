use serde::{Deserialize, Serialize};
use tessera_store::Transaction;

use crate::error::DbError;

pub(crate) const SYS_CF: &str = "_sys";
const COL_PREFIX: &[u8] = b"__col__:";

fn col_key(name: &str) -> Vec<u8> {
    let mut key = COL_PREFIX.to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionInfo {
    name: String,
    created_at: bson::DateTime,
}

pub(crate) fn validate_name(name: &str) -> Result<(), DbError> {
    if name.is_empty() || name == SYS_CF || name.contains('\0') || name.contains('$') {
        return Err(DbError::InvalidCollectionName(name.to_string()));
    }
    Ok(())
}

pub struct Catalog;

impl Catalog {
    /// Create a collection if it does not exist yet and return its column family.
    pub fn ensure_collection<T: Transaction>(
        &self,
        txn: &mut T,
        name: &str,
    ) -> Result<T::Cf, DbError> {
        validate_name(name)?;
        let sys = txn.cf(SYS_CF)?;
        let key = col_key(name);
        if txn.get(&sys, &key)?.is_none() {
            txn.create_cf(name)?;
            let info = CollectionInfo {
                name: name.to_string(),
                created_at: bson::DateTime::now(),
            };
            txn.put(&sys, &key, &bson::serialize_to_vec(&info)?)?;
            tracing::debug!(collection = %name, "created collection");
        }
        Ok(txn.cf(name)?)
    }

    /// Column family of an existing collection, `None` if it was never written.
    pub fn collection_cf<T: Transaction>(
        &self,
        txn: &T,
        name: &str,
    ) -> Result<Option<T::Cf>, DbError> {
        validate_name(name)?;
        let sys = txn.cf(SYS_CF)?;
        if txn.get(&sys, &col_key(name))?.is_none() {
            return Ok(None);
        }
        Ok(Some(txn.cf(name)?))
    }

    pub fn list_collections<T: Transaction>(&self, txn: &T) -> Result<Vec<String>, DbError> {
        let sys = txn.cf(SYS_CF)?;
        let mut collections = Vec::new();
        for result in txn.scan_prefix(&sys, COL_PREFIX)? {
            let (_, value) = result?;
            let info: CollectionInfo = bson::deserialize_from_slice(&value)?;
            collections.push(info.name);
        }
        Ok(collections)
    }

    /// Returns whether the collection existed.
    pub fn drop_collection<T: Transaction>(&self, txn: &mut T, name: &str) -> Result<bool, DbError> {
        validate_name(name)?;
        let sys = txn.cf(SYS_CF)?;
        let key = col_key(name);
        if txn.get(&sys, &key)?.is_none() {
            return Ok(false);
        }
        txn.delete(&sys, &key)?;
        txn.drop_cf(name)?;
        Ok(true)
    }
}
