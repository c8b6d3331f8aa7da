use bson::{Bson, Document};

use crate::sort::FindOptionsError;

/// Field selection applied to returned documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Keep only the listed paths (plus `_id` unless excluded).
    Include { fields: Vec<String>, keep_id: bool },
    /// Drop the listed paths.
    Exclude(Vec<String>),
}

/// Parse `{ name: 1 }` / `{ secret: 0 }` style projections.
pub fn parse_projection(doc: &Document) -> Result<Projection, FindOptionsError> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut keep_id = true;

    for (field, value) in doc {
        let on = match value {
            Bson::Boolean(b) => *b,
            Bson::Int32(n) => *n != 0,
            Bson::Int64(n) => *n != 0,
            Bson::Double(f) => *f != 0.0,
            other => {
                return Err(FindOptionsError(format!(
                    "projection value for '{field}' must be 0 or 1, got {other}"
                )));
            }
        };
        match (field.as_str(), on) {
            ("_id", on) => keep_id = on,
            (_, true) => include.push(field.clone()),
            (_, false) => exclude.push(field.clone()),
        }
    }

    if !include.is_empty() && !exclude.is_empty() {
        return Err(FindOptionsError(
            "projection cannot mix inclusion and exclusion".into(),
        ));
    }
    if !include.is_empty() {
        return Ok(Projection::Include {
            fields: include,
            keep_id,
        });
    }
    if !keep_id {
        exclude.push("_id".into());
    }
    Ok(Projection::Exclude(exclude))
}

impl Projection {
    pub fn apply(&self, doc: &Document) -> Document {
        match self {
            Projection::Include { fields, keep_id } => {
                let mut out = Document::new();
                if *keep_id {
                    if let Some(id) = doc.get("_id") {
                        out.insert("_id", id.clone());
                    }
                }
                for field in fields {
                    copy_path(doc, &mut out, field);
                }
                out
            }
            Projection::Exclude(fields) => {
                let mut out = doc.clone();
                for field in fields {
                    remove_path(&mut out, field);
                }
                out
            }
        }
    }
}

fn copy_path(src: &Document, dst: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            if let Some(v) = src.get(path) {
                dst.insert(path, v.clone());
            }
        }
        Some((head, rest)) => {
            let Some(Bson::Document(sub)) = src.get(head) else {
                return;
            };
            if !matches!(dst.get(head), Some(Bson::Document(_))) {
                dst.insert(head, Document::new());
            }
            if let Some(Bson::Document(target)) = dst.get_mut(head) {
                copy_path(sub, target, rest);
            }
        }
    }
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(sub)) = doc.get_mut(head) {
                remove_path(sub, rest);
            }
        }
    }
}
