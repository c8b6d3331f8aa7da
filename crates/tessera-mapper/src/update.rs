use bson::{Bson, Document};
use serde::Serialize;
use tessera_db::{UpdateOptions, WriteResult};
use tessera_store::Store;
use tracing::debug;

use crate::collection::{Collection, bind, marshal};
use crate::error::MapperError;
use crate::parameter::Parameter;

/// Pending update, built by [`Collection::update`] and run by
/// [`Update::with`] or [`Update::with_pojo`].
pub struct Update<'c, S: Store> {
    collection: &'c Collection<S>,
    filter: Result<Document, MapperError>,
    options: UpdateOptions,
}

impl<'c, S: Store> Update<'c, S> {
    pub(crate) fn new(collection: &'c Collection<S>, filter: Result<Document, MapperError>) -> Self {
        Self {
            collection,
            filter,
            options: UpdateOptions::default(),
        }
    }

    pub fn upsert(mut self) -> Self {
        self.options.upsert = true;
        self
    }

    pub fn multi(mut self) -> Self {
        self.options.multi = true;
        self
    }

    /// Apply a modifier template such as `"{$set: {subBean: #}}"`, or a
    /// replacement document when it has no operators.
    pub fn with(self, modifier: &str, params: Vec<Parameter>) -> Result<WriteResult, MapperError> {
        let modifier = bind(modifier, params)?;
        self.run(modifier)
    }

    /// `$set` every field of `pojo` except `_id`.
    pub fn with_pojo<T: Serialize + ?Sized>(self, pojo: &T) -> Result<WriteResult, MapperError> {
        let mut fields = marshal(pojo)?;
        fields.remove("_id");
        let mut modifier = Document::new();
        modifier.insert("$set", Bson::Document(fields));
        self.run(modifier)
    }

    fn run(self, modifier: Document) -> Result<WriteResult, MapperError> {
        let filter = self.filter?;
        let collection = self.collection;
        debug!(
            collection = %collection.name(),
            filter = %filter,
            modifier = %modifier,
            upsert = self.options.upsert,
            multi = self.options.multi,
            "update"
        );
        Ok(collection.db().update(
            collection.name(),
            &filter,
            &modifier,
            self.options,
            &collection.write_concern(),
        )?)
    }
}
