mod catalog;
mod concern;
mod config;
mod database;
mod encoding;
mod error;
mod options;

pub use bson::{Bson, Document};
pub use concern::{Acknowledgment, WriteConcern, WriteResult};
pub use config::DatabaseConfig;
pub use database::{Database, DatabaseTransaction, InsertOutcome, UpdateOutcome};
pub use error::DbError;
pub use options::{FindOptions, UpdateOptions};
