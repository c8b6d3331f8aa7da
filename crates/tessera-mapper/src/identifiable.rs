use bson::oid::ObjectId;

/// Types whose `_id` can be assigned after a save.
///
/// [`Collection::save`](crate::Collection::save) generates an ObjectId for
/// documents that serialize without one and hands it back through
/// [`Identifiable::set_id`].
pub trait Identifiable {
    fn set_id(&mut self, id: ObjectId);
}
