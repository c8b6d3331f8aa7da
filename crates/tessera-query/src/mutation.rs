use bson::{Bson, Document};

use crate::value::values_equal;

/// Error raised while parsing or applying an update document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("mutation error: {0}")]
pub struct MutationError(pub String);

/// A single field-level mutation operator.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    /// Set a field to a value. Creates the field if it doesn't exist.
    Set(Bson),
    /// Remove a field from the document.
    Unset,
    /// Increment a numeric field by the given amount (negative for decrement).
    Inc(Bson),
    /// Append a value to the end of an array field. Creates the array if missing.
    Push(Bson),
    /// Rename a field. Value is the new field path.
    Rename(String),
}

/// A single field + operator pair within a Mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMutation {
    pub field: String,
    pub op: MutationOp,
}

/// A complete operator update: a list of (field, operator) pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub ops: Vec<FieldMutation>,
}

/// A parsed update document.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Whole-document replacement; `_id` is preserved.
    Replace(Document),
    /// Operator update (`$set`, `$inc`, ...).
    Modify(Mutation),
}

/// Parse an update document.
///
/// A document whose keys all start with `$` is an operator update; a document
/// with no `$` keys is a replacement. Mixing the two is rejected, as are
/// operators targeting `_id`.
pub fn parse_update(doc: &Document) -> Result<Update, MutationError> {
    let operators = doc.keys().filter(|k| k.starts_with('$')).count();
    if operators == 0 {
        return Ok(Update::Replace(doc.clone()));
    }
    if operators != doc.len() {
        return Err(MutationError(
            "update document mixes operators and replacement fields".into(),
        ));
    }

    let mut ops = Vec::new();
    for (key, value) in doc {
        let fields = match value {
            Bson::Document(fields) => fields,
            _ => return Err(MutationError(format!("{key} value must be a document"))),
        };
        if fields.is_empty() {
            return Err(MutationError(format!("{key} must name at least one field")));
        }

        for (field, operand) in fields {
            let op = match key.as_str() {
                "$set" => MutationOp::Set(operand.clone()),
                "$unset" => MutationOp::Unset,
                "$inc" => match operand {
                    Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => {
                        MutationOp::Inc(operand.clone())
                    }
                    _ => return Err(MutationError(format!("$inc value for '{field}' must be numeric"))),
                },
                "$push" => MutationOp::Push(operand.clone()),
                "$rename" => match operand {
                    Bson::String(to) if to != field => MutationOp::Rename(to.clone()),
                    Bson::String(_) => {
                        return Err(MutationError(format!("$rename source and target are both '{field}'")));
                    }
                    _ => return Err(MutationError(format!("$rename value for '{field}' must be a string"))),
                },
                k => return Err(MutationError(format!("unknown operator: {k}"))),
            };
            ops.push(FieldMutation {
                field: field.clone(),
                op,
            });
        }
    }

    for fm in &ops {
        let targets_id = |path: &str| path.split('.').next() == Some("_id");
        let renamed_to_id = matches!(&fm.op, MutationOp::Rename(to) if targets_id(to));
        if targets_id(&fm.field) || renamed_to_id {
            return Err(MutationError("cannot mutate _id field".into()));
        }
    }

    Ok(Update::Modify(Mutation { ops }))
}

impl Update {
    /// Apply to `doc` in place. Returns whether the document changed.
    pub fn apply(&self, doc: &mut Document) -> Result<bool, MutationError> {
        match self {
            Update::Modify(mutation) => mutation.apply(doc),
            Update::Replace(replacement) => {
                let id = doc.get("_id").cloned();
                if let (Some(current), Some(requested)) = (&id, replacement.get("_id")) {
                    if !values_equal(current, requested) {
                        return Err(MutationError("replacement cannot change _id".into()));
                    }
                }

                let mut next = Document::new();
                if let Some(id) = id.or_else(|| replacement.get("_id").cloned()) {
                    next.insert("_id", id);
                }
                for (k, v) in replacement {
                    if k != "_id" {
                        next.insert(k.clone(), v.clone());
                    }
                }

                let changed = next != *doc;
                *doc = next;
                Ok(changed)
            }
        }
    }
}

impl Mutation {
    /// Apply this mutation to a document. Returns whether the document changed.
    pub fn apply(&self, doc: &mut Document) -> Result<bool, MutationError> {
        let mut changed = false;

        for fm in &self.ops {
            changed |= match &fm.op {
                MutationOp::Set(val) => match resolve_parent_mut(doc, &fm.field, true)? {
                    Some((parent, leaf)) => op_set(parent, leaf, val.clone()),
                    None => false,
                },
                MutationOp::Unset => match resolve_parent_mut(doc, &fm.field, false)? {
                    Some((parent, leaf)) => parent.remove(leaf).is_some(),
                    None => false,
                },
                MutationOp::Inc(amount) => match resolve_parent_mut(doc, &fm.field, true)? {
                    Some((parent, leaf)) => op_inc(parent, leaf, amount)?,
                    None => false,
                },
                MutationOp::Push(val) => match resolve_parent_mut(doc, &fm.field, true)? {
                    Some((parent, leaf)) => op_push(parent, leaf, val)?,
                    None => false,
                },
                MutationOp::Rename(to) => {
                    let moved = match resolve_parent_mut(doc, &fm.field, false)? {
                        Some((parent, leaf)) => parent.remove(leaf),
                        None => None,
                    };
                    match moved {
                        Some(value) => match resolve_parent_mut(doc, to, true)? {
                            Some((parent, leaf)) => {
                                parent.insert(leaf, value);
                                true
                            }
                            None => false,
                        },
                        None => false,
                    }
                }
            };
        }

        Ok(changed)
    }
}

/// Build the document an upsert starts from: every equality condition in the
/// filter (including those nested in `$and`) becomes a field.
pub fn upsert_seed(filter: &Document) -> Result<Document, MutationError> {
    let mut seed = Document::new();
    collect_equalities(filter, &mut seed)?;
    Ok(seed)
}

fn collect_equalities(filter: &Document, seed: &mut Document) -> Result<(), MutationError> {
    for (key, value) in filter {
        if key == "$and" {
            if let Bson::Array(items) = value {
                for item in items {
                    if let Bson::Document(sub) = item {
                        collect_equalities(sub, seed)?;
                    }
                }
            }
            continue;
        }
        if key.starts_with('$') {
            continue;
        }

        let eq_value = match value {
            Bson::Document(sub) if sub.keys().next().is_some_and(|k| k.starts_with('$')) => {
                match sub.get("$eq") {
                    Some(v) => v.clone(),
                    None => continue,
                }
            }
            other => other.clone(),
        };

        if let Some((parent, leaf)) = resolve_parent_mut(seed, key, true)? {
            parent.insert(leaf, eq_value);
        }
    }
    Ok(())
}

/// Walk a dotted path to the document holding its last segment.
///
/// With `create`, missing intermediate documents are inserted; otherwise a
/// missing segment yields `Ok(None)`. Traversing a non-document is an error.
fn resolve_parent_mut<'d, 'p>(
    doc: &'d mut Document,
    path: &'p str,
    create: bool,
) -> Result<Option<(&'d mut Document, &'p str)>, MutationError> {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };
    if leaf.is_empty() {
        return Err(MutationError(format!("invalid field path '{path}'")));
    }

    let mut current = doc;
    if let Some(parents) = parents {
        for segment in parents.split('.') {
            if !current.contains_key(segment) {
                if !create {
                    return Ok(None);
                }
                current.insert(segment, Document::new());
            }
            match current.get_mut(segment) {
                Some(Bson::Document(next)) => current = next,
                Some(other) => {
                    return Err(MutationError(format!(
                        "cannot traverse '{segment}' of type {:?} in path '{path}'",
                        other.element_type()
                    )));
                }
                None => return Ok(None),
            }
        }
    }

    Ok(Some((current, leaf)))
}

fn op_set(parent: &mut Document, leaf: &str, val: Bson) -> bool {
    if parent.get(leaf) == Some(&val) {
        return false;
    }
    parent.insert(leaf, val);
    true
}

fn op_inc(parent: &mut Document, leaf: &str, amount: &Bson) -> Result<bool, MutationError> {
    let next = match parent.get(leaf) {
        None => amount.clone(),
        Some(current) => add_numbers(current, amount).ok_or_else(|| {
            MutationError(format!(
                "cannot $inc non-numeric field '{leaf}' of type {:?}",
                current.element_type()
            ))
        })?,
    };
    let changed = parent.get(leaf) != Some(&next);
    parent.insert(leaf, next);
    Ok(changed)
}

fn add_numbers(a: &Bson, b: &Bson) -> Option<Bson> {
    Some(match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => match x.checked_add(*y) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*x) + i64::from(*y)),
        },
        (Bson::Int32(x), Bson::Int64(y)) => Bson::Int64(i64::from(*x).checked_add(*y)?),
        (Bson::Int64(x), Bson::Int32(y)) => Bson::Int64(x.checked_add(i64::from(*y))?),
        (Bson::Int64(x), Bson::Int64(y)) => Bson::Int64(x.checked_add(*y)?),
        (Bson::Double(x), Bson::Double(y)) => Bson::Double(x + y),
        (Bson::Double(x), Bson::Int32(y)) => Bson::Double(x + f64::from(*y)),
        (Bson::Double(x), Bson::Int64(y)) => Bson::Double(x + *y as f64),
        (Bson::Int32(x), Bson::Double(y)) => Bson::Double(f64::from(*x) + y),
        (Bson::Int64(x), Bson::Double(y)) => Bson::Double(*x as f64 + y),
        _ => return None,
    })
}

fn op_push(parent: &mut Document, leaf: &str, val: &Bson) -> Result<bool, MutationError> {
    match parent.get_mut(leaf) {
        None => {
            parent.insert(leaf, Bson::Array(vec![val.clone()]));
        }
        Some(Bson::Array(items)) => items.push(val.clone()),
        Some(other) => {
            return Err(MutationError(format!(
                "cannot $push to non-array field '{leaf}' of type {:?}",
                other.element_type()
            )));
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn apply(update: Document, mut doc: Document) -> (bool, Document) {
        let changed = parse_update(&update).unwrap().apply(&mut doc).unwrap();
        (changed, doc)
    }

    #[test]
    fn set_replaces_sub_document() {
        let (changed, doc) = apply(
            doc! { "$set": { "subBean": { "value": "newValue" } } },
            doc! { "_id": 1, "key": "test", "subBean": { "value": "value" } },
        );
        assert!(changed);
        assert_eq!(doc, doc! { "_id": 1, "key": "test", "subBean": { "value": "newValue" } });
    }

    #[test]
    fn set_same_value_is_unchanged() {
        let (changed, _) = apply(doc! { "$set": { "a": 1 } }, doc! { "a": 1 });
        assert!(!changed);
    }

    #[test]
    fn set_dotted_path_creates_parents() {
        let (_, doc) = apply(doc! { "$set": { "a.b.c": 1 } }, doc! {});
        assert_eq!(doc, doc! { "a": { "b": { "c": 1 } } });
    }

    #[test]
    fn unset_removes_field() {
        let (changed, doc) = apply(doc! { "$unset": { "a": "" } }, doc! { "a": 1, "b": 2 });
        assert!(changed);
        assert_eq!(doc, doc! { "b": 2 });

        let (changed, _) = apply(doc! { "$unset": { "x.y": "" } }, doc! { "a": 1 });
        assert!(!changed);
    }

    #[test]
    fn inc_promotes_on_overflow() {
        let (_, doc) = apply(doc! { "$inc": { "n": 1 } }, doc! { "n": i32::MAX });
        assert_eq!(doc.get("n"), Some(&Bson::Int64(i64::from(i32::MAX) + 1)));

        let (_, doc) = apply(doc! { "$inc": { "n": 0.5 } }, doc! { "n": 1 });
        assert_eq!(doc.get("n"), Some(&Bson::Double(1.5)));

        let (_, doc) = apply(doc! { "$inc": { "n": 3 } }, doc! {});
        assert_eq!(doc.get("n"), Some(&Bson::Int32(3)));
    }

    #[test]
    fn inc_non_numeric_field_errors() {
        let update = parse_update(&doc! { "$inc": { "name": 1 } }).unwrap();
        let err = update.apply(&mut doc! { "name": "John" }).unwrap_err();
        assert!(err.0.contains("non-numeric"), "{}", err.0);
    }

    #[test]
    fn push_appends_or_creates() {
        let (_, doc) = apply(doc! { "$push": { "tags": "b" } }, doc! { "tags": ["a"] });
        assert_eq!(doc, doc! { "tags": ["a", "b"] });
        let (_, doc) = apply(doc! { "$push": { "tags": "a" } }, doc! {});
        assert_eq!(doc, doc! { "tags": ["a"] });
    }

    #[test]
    fn rename_moves_value() {
        let (changed, doc) = apply(doc! { "$rename": { "name": "fullName" } }, doc! { "name": "John" });
        assert!(changed);
        assert_eq!(doc, doc! { "fullName": "John" });
    }

    #[test]
    fn replacement_keeps_id() {
        let (changed, doc) = apply(
            doc! { "name": "Robert" },
            doc! { "_id": 7, "name": "John", "age": 3 },
        );
        assert!(changed);
        assert_eq!(doc, doc! { "_id": 7, "name": "Robert" });
    }

    #[test]
    fn replacement_cannot_change_id() {
        let update = parse_update(&doc! { "_id": 8, "name": "Robert" }).unwrap();
        let err = update.apply(&mut doc! { "_id": 7 }).unwrap_err();
        assert!(err.0.contains("_id"));
    }

    #[test]
    fn mixed_update_errors() {
        let err = parse_update(&doc! { "$set": { "a": 1 }, "b": 2 }).unwrap_err();
        assert!(err.0.contains("mixes"));
    }

    #[test]
    fn operator_on_id_errors() {
        let err = parse_update(&doc! { "$set": { "_id": 1 } }).unwrap_err();
        assert!(err.0.contains("_id"));
    }

    #[test]
    fn unknown_operator_errors() {
        let err = parse_update(&doc! { "$bump": { "a": 1 } }).unwrap_err();
        assert!(err.0.contains("unknown operator"));
    }

    #[test]
    fn upsert_seed_collects_equalities() {
        let seed = upsert_seed(&doc! {
            "key": "test",
            "age": { "$gt": 3 },
            "sub.value": { "$eq": "x" },
            "$and": [{ "flag": true }],
        })
        .unwrap();
        assert_eq!(seed, doc! { "key": "test", "sub": { "value": "x" }, "flag": true });
    }
}
