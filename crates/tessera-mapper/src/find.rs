use bson::Document;
use serde::de::DeserializeOwned;
use tessera_db::FindOptions;
use tessera_store::Store;
use tracing::debug;

use crate::collection::{Collection, bind};
use crate::error::MapperError;
use crate::parameter::Parameter;

/// Single-document lookup, built by [`Collection::find_one`].
pub struct FindOne<'c, S: Store> {
    collection: &'c Collection<S>,
    filter: Result<Document, MapperError>,
    projection: Option<Result<Document, MapperError>>,
}

impl<'c, S: Store> FindOne<'c, S> {
    pub(crate) fn new(collection: &'c Collection<S>, filter: Result<Document, MapperError>) -> Self {
        Self {
            collection,
            filter,
            projection: None,
        }
    }

    /// Restrict returned fields, e.g. `"{name: 1}"`.
    pub fn projection(mut self, template: &str, params: Vec<Parameter>) -> Self {
        self.projection = Some(bind(template, params));
        self
    }

    pub fn document(self) -> Result<Option<Document>, MapperError> {
        let options = FindOptions {
            filter: self.filter?,
            projection: self.projection.transpose()?,
            ..Default::default()
        };
        debug!(collection = %self.collection.name(), filter = %options.filter, "find one");
        Ok(self.collection.db().find_one(self.collection.name(), &options)?)
    }

    /// Unmarshal the match into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Option<T>, MapperError> {
        self.document()?.map(unmarshal).transpose()
    }

    pub fn map<R>(self, f: impl FnOnce(Document) -> R) -> Result<Option<R>, MapperError> {
        Ok(self.document()?.map(f))
    }
}

/// Multi-document query, built by [`Collection::find`].
pub struct Find<'c, S: Store> {
    collection: &'c Collection<S>,
    filter: Result<Document, MapperError>,
    sort: Option<Result<Document, MapperError>>,
    projection: Option<Result<Document, MapperError>>,
    skip: Option<usize>,
    limit: Option<usize>,
}

impl<'c, S: Store> Find<'c, S> {
    pub(crate) fn new(collection: &'c Collection<S>, filter: Result<Document, MapperError>) -> Self {
        Self {
            collection,
            filter,
            sort: None,
            projection: None,
            skip: None,
            limit: None,
        }
    }

    /// Sort order, e.g. `"{age: -1}"`.
    pub fn sort(mut self, template: &str) -> Self {
        self.sort = Some(bind(template, Vec::new()));
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Zero means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn projection(mut self, template: &str, params: Vec<Parameter>) -> Self {
        self.projection = Some(bind(template, params));
        self
    }

    pub fn documents(self) -> Result<Vec<Document>, MapperError> {
        let options = FindOptions {
            filter: self.filter?,
            sort: self.sort.transpose()?,
            skip: self.skip,
            limit: self.limit,
            projection: self.projection.transpose()?,
        };
        debug!(collection = %self.collection.name(), filter = %options.filter, "find");
        Ok(self.collection.db().find(self.collection.name(), &options)?)
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<Vec<T>, MapperError> {
        self.documents()?.into_iter().map(unmarshal).collect()
    }

    pub fn map<R>(self, f: impl FnMut(Document) -> R) -> Result<Vec<R>, MapperError> {
        Ok(self.documents()?.into_iter().map(f).collect())
    }
}

fn unmarshal<T: DeserializeOwned>(doc: Document) -> Result<T, MapperError> {
    bson::deserialize_from_document(doc).map_err(MapperError::Unmarshal)
}
