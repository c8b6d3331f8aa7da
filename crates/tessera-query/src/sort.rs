use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::path::lookup;
use crate::value::compare_values;

const NULL: &Bson = &Bson::Null;
const EMPTY_ARRAY: &Bson = &Bson::MinKey;

/// Invalid sort or projection document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid find options: {0}")]
pub struct FindOptionsError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Parse `{ field: 1, other: -1 }` into sort keys, in declaration order.
pub fn parse_sort(doc: &Document) -> Result<Vec<Sort>, FindOptionsError> {
    doc.iter()
        .map(|(field, value)| {
            let direction = match value {
                Bson::Int32(1) | Bson::Int64(1) => SortDirection::Asc,
                Bson::Int32(-1) | Bson::Int64(-1) => SortDirection::Desc,
                Bson::Double(d) if *d == 1.0 => SortDirection::Asc,
                Bson::Double(d) if *d == -1.0 => SortDirection::Desc,
                other => {
                    return Err(FindOptionsError(format!(
                        "sort direction for '{field}' must be 1 or -1, got {other}"
                    )));
                }
            };
            Ok(Sort {
                field: field.clone(),
                direction,
            })
        })
        .collect()
}

/// Compare two documents by a list of sort keys. Missing fields sort as null.
///
/// An array field sorts by its smallest element when ascending and by its
/// largest when descending; an empty array sorts below null.
pub fn compare_by(a: &Document, b: &Document, sorts: &[Sort]) -> Ordering {
    for sort in sorts {
        let left = sort_key(a, sort);
        let right = sort_key(b, sort);
        let ord = compare_values(left, right);
        let ord = match sort.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn sort_key<'a>(doc: &'a Document, sort: &Sort) -> &'a Bson {
    let found = lookup(doc, &sort.field);
    if found.is_empty() {
        return NULL;
    }

    let values = found.into_iter().flat_map(|v| -> Box<dyn Iterator<Item = &'a Bson> + 'a> {
        match v {
            Bson::Array(items) => Box::new(items.iter()),
            other => Box::new(std::iter::once(other)),
        }
    });
    let key = match sort.direction {
        SortDirection::Asc => values.min_by(|x, y| compare_values(x, y)),
        SortDirection::Desc => values.max_by(|x, y| compare_values(x, y)),
    };
    key.unwrap_or(EMPTY_ARRAY)
}
