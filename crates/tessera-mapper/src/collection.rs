use std::sync::Arc;

use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use serde::Serialize;
use tessera_db::{Database, WriteConcern, WriteResult};
use tessera_store::Store;
use tracing::debug;

use crate::error::MapperError;
use crate::find::{Find, FindOne};
use crate::identifiable::Identifiable;
use crate::parameter::Parameter;
use crate::update::Update;

/// Handle on a named collection.
///
/// Handles are cheap to clone. [`Collection::with_write_concern`] returns a
/// new handle and leaves the original untouched.
pub struct Collection<S: Store> {
    db: Arc<Database<S>>,
    name: String,
    write_concern: Option<WriteConcern>,
}

impl<S: Store> Clone for Collection<S> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            name: self.name.clone(),
            write_concern: self.write_concern,
        }
    }
}

impl<S: Store> Collection<S> {
    pub(crate) fn new(db: Arc<Database<S>>, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
            write_concern: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concern used for writes through this handle.
    pub fn write_concern(&self) -> WriteConcern {
        self.write_concern
            .unwrap_or_else(|| self.db.default_write_concern())
    }

    pub fn with_write_concern(&self, concern: WriteConcern) -> Self {
        Self {
            write_concern: Some(concern),
            ..self.clone()
        }
    }

    pub(crate) fn db(&self) -> &Database<S> {
        &self.db
    }

    // ── Writes ──────────────────────────────────────────────────

    pub fn insert(&self, template: &str, params: Vec<Parameter>) -> Result<WriteResult, MapperError> {
        let doc = bind(template, params)?;
        self.insert_documents(vec![doc])
    }

    pub fn insert_pojo<T: Serialize + ?Sized>(&self, pojo: &T) -> Result<WriteResult, MapperError> {
        self.insert_documents(vec![marshal(pojo)?])
    }

    /// Like [`Collection::insert_pojo`], but a pojo serialized without an
    /// `_id` gets a new ObjectId, written back through [`Identifiable::set_id`].
    pub fn insert_pojo_mut<T: Serialize + Identifiable>(
        &self,
        pojo: &mut T,
    ) -> Result<WriteResult, MapperError> {
        let mut doc = marshal(&*pojo)?;
        let generated = assign_id(&mut doc);
        let result = self.insert_documents(vec![doc])?;
        if let Some(id) = generated {
            pojo.set_id(id);
        }
        Ok(result)
    }

    /// Insert in order; stops at the first failure.
    pub fn insert_pojos<T: Serialize>(&self, pojos: &[T]) -> Result<WriteResult, MapperError> {
        let docs = pojos.iter().map(marshal).collect::<Result<Vec<_>, _>>()?;
        self.insert_documents(docs)
    }

    /// Insert or replace by `_id`. A pojo serialized without an `_id` gets a
    /// new ObjectId, written back through [`Identifiable::set_id`].
    pub fn save<T: Serialize + Identifiable>(&self, pojo: &mut T) -> Result<WriteResult, MapperError> {
        let mut doc = marshal(&*pojo)?;
        let generated = assign_id(&mut doc);
        let result = self.db.save(&self.name, doc, &self.write_concern())?;
        if let Some(id) = generated {
            pojo.set_id(id);
        }
        Ok(result)
    }

    pub fn update(&self, query: &str, params: Vec<Parameter>) -> Update<'_, S> {
        Update::new(self, bind(query, params))
    }

    /// Remove every document matching the query.
    pub fn remove(&self, query: &str, params: Vec<Parameter>) -> Result<WriteResult, MapperError> {
        let filter = bind(query, params)?;
        debug!(collection = %self.name, filter = %filter, "remove");
        Ok(self
            .db
            .remove(&self.name, &filter, true, &self.write_concern())?)
    }

    pub fn remove_by_id(&self, id: impl Into<Bson>) -> Result<WriteResult, MapperError> {
        let filter = doc! { "_id": id.into() };
        Ok(self
            .db
            .remove(&self.name, &filter, false, &self.write_concern())?)
    }

    pub fn drop(&self) -> Result<(), MapperError> {
        self.db.drop_collection(&self.name)?;
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn find_one(&self, query: &str, params: Vec<Parameter>) -> FindOne<'_, S> {
        FindOne::new(self, bind(query, params))
    }

    pub fn find_one_by_id(&self, id: impl Into<Bson>) -> FindOne<'_, S> {
        FindOne::new(self, Ok(doc! { "_id": id.into() }))
    }

    pub fn find(&self, query: &str, params: Vec<Parameter>) -> Find<'_, S> {
        Find::new(self, bind(query, params))
    }

    pub fn count(&self, query: &str, params: Vec<Parameter>) -> Result<u64, MapperError> {
        let filter = bind(query, params)?;
        Ok(self.db.count(&self.name, &filter)?)
    }

    fn insert_documents(&self, docs: Vec<Document>) -> Result<WriteResult, MapperError> {
        debug!(collection = %self.name, count = docs.len(), "insert");
        Ok(self.db.insert(&self.name, docs, &self.write_concern())?)
    }
}

/// Give `doc` a fresh ObjectId when its `_id` is missing or null.
fn assign_id(doc: &mut Document) -> Option<ObjectId> {
    match doc.get("_id") {
        None | Some(Bson::Null) => {
            let id = ObjectId::new();
            doc.insert("_id", id);
            Some(id)
        }
        Some(_) => None,
    }
}

pub(crate) fn bind(template: &str, params: Vec<Parameter>) -> Result<Document, MapperError> {
    let params = Parameter::resolve(params)?;
    Ok(tessera_query::bind(template, &params)?)
}

pub(crate) fn marshal<T: Serialize + ?Sized>(pojo: &T) -> Result<Document, MapperError> {
    bson::serialize_to_document(pojo).map_err(MapperError::Marshal)
}
