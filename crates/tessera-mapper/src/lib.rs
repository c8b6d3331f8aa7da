//! Object/document mapper over the embedded database.
//!
//! Queries are written as relaxed-JSON templates whose `#` placeholders are
//! filled, in order, from a list of [`Parameter`]s:
//!
//! ```ignore
//! let friends = mapper.collection("friends");
//! friends.insert("{name: #, age: #}", params!["Abby", 31])?;
//! let abby: Option<Friend> = friends.find_one("{name: #}", params!["Abby"]).decode()?;
//! ```

mod collection;
mod error;
mod find;
mod identifiable;
mod mapper;
mod parameter;
mod update;

pub use collection::Collection;
pub use error::MapperError;
pub use find::{Find, FindOne};
pub use identifiable::Identifiable;
pub use mapper::Mapper;
pub use parameter::Parameter;
pub use update::Update;

pub use tessera_db::{Acknowledgment, DatabaseConfig, WriteConcern, WriteResult};
