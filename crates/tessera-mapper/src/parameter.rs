use bson::oid::ObjectId;
use bson::{Bson, Document};
use serde::Serialize;

use crate::error::MapperError;

/// A value bound to a `#` placeholder.
///
/// Marshalling failures are kept until the template is bound so that they
/// can be reported with the parameter's position.
#[derive(Debug, Clone)]
pub struct Parameter(Result<Bson, String>);

impl Parameter {
    /// Marshal any serializable value; structs become sub-documents.
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Self {
        Self(bson::serialize_to_bson(value).map_err(|e| e.to_string()))
    }

    pub(crate) fn resolve(params: Vec<Parameter>) -> Result<Vec<Bson>, MapperError> {
        params
            .into_iter()
            .enumerate()
            .map(|(index, param)| {
                param
                    .0
                    .map_err(|message| MapperError::Parameter { index, message })
            })
            .collect()
    }
}

impl<T: Serialize + ?Sized> From<&T> for Parameter {
    fn from(value: &T) -> Self {
        Self::of(value)
    }
}

macro_rules! impl_from_bson {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Parameter {
                fn from(value: $ty) -> Self {
                    Self(Ok(Bson::from(value)))
                }
            }
        )*
    };
}

impl_from_bson!(String, i32, i64, f64, bool, ObjectId, Document, bson::DateTime);

impl From<Bson> for Parameter {
    fn from(value: Bson) -> Self {
        Self(Ok(value))
    }
}

/// Build a parameter list: `params!["Abby", 31, &sub_bean]`.
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Parameter>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Parameter::from($value)),+]
    };
}
