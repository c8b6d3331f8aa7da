mod expression;
mod mutation;
mod path;
mod projection;
mod sort;
mod template;
mod value;

pub use expression::{Expression, FilterParseError, parse_filter};
pub use mutation::{FieldMutation, Mutation, MutationError, MutationOp, Update, parse_update, upsert_seed};
pub use path::lookup;
pub use projection::{Projection, parse_projection};
pub use sort::{FindOptionsError, Sort, SortDirection, compare_by, parse_sort};
pub use template::{TemplateError, bind};
pub use value::{compare_values, type_rank, values_equal};
