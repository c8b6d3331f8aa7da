use bson::oid::ObjectId;
use bson::{Bson, Document};
use tessera_query::{
    Update, compare_by, parse_filter, parse_projection, parse_sort, parse_update, upsert_seed,
};
use tessera_store::{Store, Transaction};
use tracing::{debug, warn};

use crate::catalog::{Catalog, SYS_CF};
use crate::concern::{WriteConcern, WriteResult};
use crate::config::DatabaseConfig;
use crate::encoding;
use crate::error::DbError;
use crate::options::{FindOptions, UpdateOptions};

pub struct Database<S: Store> {
    store: S,
    config: DatabaseConfig,
    catalog: Catalog,
}

impl<S: Store> Database<S> {
    pub fn open(store: S, config: DatabaseConfig) -> Result<Self, DbError> {
        config.write_concern.validate()?;
        store.create_cf(SYS_CF)?;
        Ok(Self {
            store,
            config,
            catalog: Catalog,
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Concern used by writes that do not pick one.
    pub fn default_write_concern(&self) -> WriteConcern {
        self.config.write_concern
    }

    pub fn begin(&self, read_only: bool) -> Result<DatabaseTransaction<'_, S>, DbError> {
        let txn = self.store.begin(read_only)?;
        Ok(DatabaseTransaction {
            txn,
            catalog: &self.catalog,
        })
    }

    // ── Writes ──────────────────────────────────────────────────

    /// Insert documents in order. Documents before a failing one stay inserted.
    pub fn insert(
        &self,
        collection: &str,
        docs: Vec<Document>,
        concern: &WriteConcern,
    ) -> Result<WriteResult, DbError> {
        concern.validate()?;
        let result = self
            .write(|txn| Ok(txn.insert_many(collection, docs)))
            .and_then(|outcome| {
                debug!(collection = %collection, n = outcome.inserted_ids.len(), "insert");
                match outcome.error {
                    Some(err) => Err(err),
                    None => {
                        let mut result = WriteResult::acknowledged(*concern);
                        result.n = outcome.inserted_ids.len() as u64;
                        result.inserted_ids = outcome.inserted_ids;
                        Ok(result)
                    }
                }
            });
        acknowledge("insert", collection, concern, result)
    }

    pub fn update(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
        concern: &WriteConcern,
    ) -> Result<WriteResult, DbError> {
        concern.validate()?;
        let result = self
            .write(|txn| txn.update(collection, filter, update, options))
            .map(|outcome| {
                debug!(
                    collection = %collection,
                    matched = outcome.matched,
                    modified = outcome.modified,
                    upserted = outcome.upserted_id.is_some(),
                    "update"
                );
                let mut result = WriteResult::acknowledged(*concern);
                result.updated_existing = outcome.matched > 0;
                result.n = if outcome.upserted_id.is_some() {
                    1
                } else {
                    outcome.matched
                };
                result.upserted_id = outcome.upserted_id;
                result
            });
        acknowledge("update", collection, concern, result)
    }

    pub fn remove(
        &self,
        collection: &str,
        filter: &Document,
        multi: bool,
        concern: &WriteConcern,
    ) -> Result<WriteResult, DbError> {
        concern.validate()?;
        let result = self
            .write(|txn| txn.remove(collection, filter, multi))
            .map(|removed| {
                debug!(collection = %collection, removed, "remove");
                let mut result = WriteResult::acknowledged(*concern);
                result.n = removed;
                result
            });
        acknowledge("remove", collection, concern, result)
    }

    /// Replace the document with the same `_id`, or insert it.
    pub fn save(
        &self,
        collection: &str,
        doc: Document,
        concern: &WriteConcern,
    ) -> Result<WriteResult, DbError> {
        concern.validate()?;
        let result = self.write(|txn| txn.save(collection, doc)).map(|outcome| {
            debug!(collection = %collection, updated_existing = outcome.matched > 0, "save");
            let mut result = WriteResult::acknowledged(*concern);
            result.n = 1;
            result.updated_existing = outcome.matched > 0;
            result.upserted_id = outcome.upserted_id;
            result
        });
        acknowledge("save", collection, concern, result)
    }

    /// Returns whether the collection existed.
    pub fn drop_collection(&self, collection: &str) -> Result<bool, DbError> {
        let dropped = self.write(|txn| txn.drop_collection(collection))?;
        debug!(collection = %collection, dropped, "drop collection");
        Ok(dropped)
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn find(&self, collection: &str, options: &FindOptions) -> Result<Vec<Document>, DbError> {
        self.begin(true)?.find(collection, options)
    }

    pub fn find_one(
        &self,
        collection: &str,
        options: &FindOptions,
    ) -> Result<Option<Document>, DbError> {
        self.begin(true)?.find_one(collection, options)
    }

    pub fn find_by_id(&self, collection: &str, id: &Bson) -> Result<Option<Document>, DbError> {
        self.begin(true)?.find_by_id(collection, id)
    }

    pub fn count(&self, collection: &str, filter: &Document) -> Result<u64, DbError> {
        self.begin(true)?.count(collection, filter)
    }

    pub fn list_collections(&self) -> Result<Vec<String>, DbError> {
        self.begin(true)?.list_collections()
    }

    /// Run `f` in a write transaction, committing when it returns `Ok`.
    fn write<'s, R>(
        &'s self,
        f: impl FnOnce(&mut DatabaseTransaction<'s, S>) -> Result<R, DbError>,
    ) -> Result<R, DbError> {
        let mut txn = self.begin(false)?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.rollback()?;
                Err(err)
            }
        }
    }
}

/// Unacknowledged writes never report failures back to the caller.
fn acknowledge(
    op: &'static str,
    collection: &str,
    concern: &WriteConcern,
    result: Result<WriteResult, DbError>,
) -> Result<WriteResult, DbError> {
    if concern.is_acknowledged() {
        return result;
    }
    if let Err(err) = &result {
        warn!(collection = %collection, op, error = %err, "unacknowledged write failed");
    }
    Ok(WriteResult::unacknowledged(*concern))
}

/// Result of an ordered multi-document insert.
#[derive(Debug)]
pub struct InsertOutcome {
    pub inserted_ids: Vec<Bson>,
    /// Failure that stopped the insert, if any.
    pub error: Option<DbError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    pub upserted_id: Option<Bson>,
}

pub struct DatabaseTransaction<'a, S: Store + 'a> {
    txn: S::Txn<'a>,
    catalog: &'a Catalog,
}

impl<'a, S: Store + 'a> DatabaseTransaction<'a, S> {
    // ── Writes ──────────────────────────────────────────────────

    /// Insert one document, generating an ObjectId `_id` when it has none.
    /// Returns the `_id`.
    pub fn insert_one(&mut self, collection: &str, doc: Document) -> Result<Bson, DbError> {
        let cf = self.catalog.ensure_collection(&mut self.txn, collection)?;
        let (id, doc) = with_id(doc);
        let key = encoding::record_key(&id)?;
        if self.txn.get(&cf, &key)?.is_some() {
            return Err(DbError::DuplicateKey {
                collection: collection.to_string(),
                key: id,
            });
        }
        self.txn.put(&cf, &key, &bson::serialize_to_vec(&doc)?)?;
        Ok(id)
    }

    pub fn insert_many(&mut self, collection: &str, docs: Vec<Document>) -> InsertOutcome {
        let mut inserted_ids = Vec::with_capacity(docs.len());
        for doc in docs {
            match self.insert_one(collection, doc) {
                Ok(id) => inserted_ids.push(id),
                Err(err) => {
                    return InsertOutcome {
                        inserted_ids,
                        error: Some(err),
                    };
                }
            }
        }
        InsertOutcome {
            inserted_ids,
            error: None,
        }
    }

    pub fn update(
        &mut self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
    ) -> Result<UpdateOutcome, DbError> {
        let expr = parse_filter(filter)?;
        let update = parse_update(update)?;
        if options.multi && matches!(update, Update::Replace(_)) {
            return Err(tessera_query::MutationError(
                "multi update requires update operators".into(),
            )
            .into());
        }

        let mut outcome = UpdateOutcome::default();
        if let Some(cf) = self.catalog.collection_cf(&self.txn, collection)? {
            for (key, mut doc) in self.records(&cf)? {
                if !expr.matches(&doc) {
                    continue;
                }
                outcome.matched += 1;
                if update.apply(&mut doc)? {
                    self.txn.put(&cf, &key, &bson::serialize_to_vec(&doc)?)?;
                    outcome.modified += 1;
                }
                if !options.multi {
                    break;
                }
            }
        }

        if outcome.matched == 0 && options.upsert {
            let mut doc = upsert_seed(filter)?;
            update.apply(&mut doc)?;
            outcome.upserted_id = Some(self.insert_one(collection, doc)?);
        }
        Ok(outcome)
    }

    /// Remove matching documents. Returns how many were removed.
    pub fn remove(&mut self, collection: &str, filter: &Document, multi: bool) -> Result<u64, DbError> {
        let expr = parse_filter(filter)?;
        let Some(cf) = self.catalog.collection_cf(&self.txn, collection)? else {
            return Ok(0);
        };
        let mut removed = 0;
        for (key, doc) in self.records(&cf)? {
            if !expr.matches(&doc) {
                continue;
            }
            self.txn.delete(&cf, &key)?;
            removed += 1;
            if !multi {
                break;
            }
        }
        Ok(removed)
    }

    /// Replace by `_id`, inserting when no document has it.
    pub fn save(&mut self, collection: &str, doc: Document) -> Result<UpdateOutcome, DbError> {
        let cf = self.catalog.ensure_collection(&mut self.txn, collection)?;
        let (id, doc) = with_id(doc);
        let key = encoding::record_key(&id)?;
        let bytes = bson::serialize_to_vec(&doc)?;
        let existing = self.txn.get(&cf, &key)?;
        self.txn.put(&cf, &key, &bytes)?;
        Ok(match existing {
            Some(previous) => UpdateOutcome {
                matched: 1,
                modified: u64::from(previous != bytes),
                upserted_id: None,
            },
            None => UpdateOutcome {
                matched: 0,
                modified: 0,
                upserted_id: Some(id),
            },
        })
    }

    pub fn drop_collection(&mut self, collection: &str) -> Result<bool, DbError> {
        self.catalog.drop_collection(&mut self.txn, collection)
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn find(&self, collection: &str, options: &FindOptions) -> Result<Vec<Document>, DbError> {
        let expr = parse_filter(&options.filter)?;
        let sort = options.sort.as_ref().map(parse_sort).transpose()?;
        let projection = options.projection.as_ref().map(parse_projection).transpose()?;

        let Some(cf) = self.catalog.collection_cf(&self.txn, collection)? else {
            return Ok(Vec::new());
        };

        let mut docs: Vec<Document> = self
            .records(&cf)?
            .into_iter()
            .map(|(_, doc)| doc)
            .filter(|doc| expr.matches(doc))
            .collect();

        if let Some(sort) = &sort {
            docs.sort_by(|a, b| compare_by(a, b, sort));
        }

        let skip = options.skip.unwrap_or(0);
        let limit = match options.limit {
            Some(0) | None => usize::MAX,
            Some(n) => n,
        };

        Ok(docs
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match &projection {
                Some(p) => p.apply(&doc),
                None => doc,
            })
            .collect())
    }

    pub fn find_one(
        &self,
        collection: &str,
        options: &FindOptions,
    ) -> Result<Option<Document>, DbError> {
        let options = FindOptions {
            limit: Some(1),
            ..options.clone()
        };
        Ok(self.find(collection, &options)?.into_iter().next())
    }

    pub fn find_by_id(&self, collection: &str, id: &Bson) -> Result<Option<Document>, DbError> {
        let key = encoding::record_key(id)?;
        let Some(cf) = self.catalog.collection_cf(&self.txn, collection)? else {
            return Ok(None);
        };
        match self.txn.get(&cf, &key)? {
            Some(bytes) => Ok(Some(bson::deserialize_from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self, collection: &str, filter: &Document) -> Result<u64, DbError> {
        let expr = parse_filter(filter)?;
        let Some(cf) = self.catalog.collection_cf(&self.txn, collection)? else {
            return Ok(0);
        };
        Ok(self
            .records(&cf)?
            .iter()
            .filter(|(_, doc)| expr.matches(doc))
            .count() as u64)
    }

    pub fn list_collections(&self) -> Result<Vec<String>, DbError> {
        self.catalog.list_collections(&self.txn)
    }

    // ── Lifecycle ───────────────────────────────────────────────

    pub fn commit(self) -> Result<(), DbError> {
        Ok(self.txn.commit()?)
    }

    pub fn rollback(self) -> Result<(), DbError> {
        Ok(self.txn.rollback()?)
    }

    /// Every record of a collection in `_id` key order.
    fn records(
        &self,
        cf: &<S::Txn<'a> as Transaction>::Cf,
    ) -> Result<Vec<(Vec<u8>, Document)>, DbError> {
        let mut records = Vec::new();
        for result in self.txn.scan_prefix(cf, encoding::data_prefix())? {
            let (key, value) = result?;
            records.push((key, bson::deserialize_from_slice(&value)?));
        }
        Ok(records)
    }
}

/// Move `_id` to the front of the document, generating one if missing or null.
fn with_id(mut doc: Document) -> (Bson, Document) {
    let id = match doc.remove("_id") {
        Some(Bson::Null) | None => Bson::ObjectId(ObjectId::new()),
        Some(id) => id,
    };
    let mut out = Document::new();
    out.insert("_id", id.clone());
    for (key, value) in doc {
        out.insert(key, value);
    }
    (id, out)
}
