use bson::Document;

/// Shape of a find: filter plus optional sort, paging and projection.
///
/// A `limit` of zero means no limit.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub filter: Document,
    pub sort: Option<Document>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    pub projection: Option<Document>,
}

impl FindOptions {
    pub fn filter(filter: Document) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert a document built from the filter when nothing matches.
    pub upsert: bool,
    /// Update every match instead of the first one.
    pub multi: bool,
}
