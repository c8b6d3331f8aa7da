use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::Regex;

use crate::path::lookup;
use crate::value::{compare_values, type_rank, values_equal};

/// Parse error for filter documents.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("filter parse error: {0}")]
pub struct FilterParseError(pub String);

/// A recursive filter expression tree.
///
/// Owns field names and values so the expression can outlive the document
/// it was parsed from.
#[derive(Debug, Clone)]
pub enum Expression {
    // Logical
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Nor(Vec<Expression>),
    // Comparison
    Eq(String, Bson),
    Ne(String, Bson),
    Gt(String, Bson),
    Gte(String, Bson),
    Lt(String, Bson),
    Lte(String, Bson),
    // Membership
    In(String, Vec<Bson>),
    Nin(String, Vec<Bson>),
    // Pattern
    Regex(String, Regex),
    // Existence
    Exists(String, bool),
}

/// Parse a filter document into an Expression tree.
///
/// - Top-level document is an implicit AND of all entries; `{}` matches everything
/// - `{ "field": value }` is implicit `$eq`
/// - `{ "field": { "$gt": v } }` uses operator sub-documents
/// - `{ "$or": [...] }` / `{ "$and": [...] }` / `{ "$nor": [...] }` for logical ops
/// - `{ "field": { "$regex": "pattern", "$options": "i" } }` for regex
pub fn parse_filter(doc: &Document) -> Result<Expression, FilterParseError> {
    let mut children = Vec::new();

    for (key, value) in doc {
        match key.as_str() {
            "$and" => children.push(Expression::And(parse_logical_array(value)?)),
            "$or" => children.push(Expression::Or(parse_logical_array(value)?)),
            "$nor" => children.push(Expression::Nor(parse_logical_array(value)?)),
            k if k.starts_with('$') => {
                return Err(FilterParseError(format!("unknown top-level operator: {k}")));
            }
            _ => children.push(parse_field_condition(key, value)?),
        }
    }

    if children.len() == 1 {
        if let Some(only) = children.pop() {
            return Ok(only);
        }
    }
    Ok(Expression::And(children))
}

fn parse_logical_array(value: &Bson) -> Result<Vec<Expression>, FilterParseError> {
    let Bson::Array(items) = value else {
        return Err(FilterParseError("$and/$or/$nor value must be an array".into()));
    };
    if items.is_empty() {
        return Err(FilterParseError("$and/$or/$nor array must not be empty".into()));
    }

    items
        .iter()
        .map(|item| match item {
            Bson::Document(sub) => parse_filter(sub),
            _ => Err(FilterParseError(
                "$and/$or/$nor array elements must be documents".into(),
            )),
        })
        .collect()
}

/// Parse a field condition: either implicit $eq or an operator sub-document.
fn parse_field_condition(field: &str, value: &Bson) -> Result<Expression, FilterParseError> {
    if let Bson::Document(sub) = value {
        if sub.keys().next().is_some_and(|k| k.starts_with('$')) {
            return parse_operator_doc(field, sub);
        }
    }
    Ok(Expression::Eq(field.to_string(), value.clone()))
}

/// Parse an operator sub-document like `{ "$gt": 21, "$lte": 100 }`.
fn parse_operator_doc(field: &str, doc: &Document) -> Result<Expression, FilterParseError> {
    if doc.contains_key("$regex") {
        return parse_regex(field, doc);
    }

    let mut conditions = Vec::with_capacity(doc.len());
    for (op, operand) in doc {
        let f = field.to_string();
        let expr = match op.as_str() {
            "$eq" => Expression::Eq(f, operand.clone()),
            "$ne" => Expression::Ne(f, operand.clone()),
            "$gt" => Expression::Gt(f, operand.clone()),
            "$gte" => Expression::Gte(f, operand.clone()),
            "$lt" => Expression::Lt(f, operand.clone()),
            "$lte" => Expression::Lte(f, operand.clone()),
            "$in" => Expression::In(f, operand_array(op, operand)?),
            "$nin" => Expression::Nin(f, operand_array(op, operand)?),
            "$exists" => match operand {
                Bson::Boolean(b) => Expression::Exists(f, *b),
                Bson::Int32(n) => Expression::Exists(f, *n != 0),
                _ => return Err(FilterParseError("$exists value must be a boolean".into())),
            },
            "$options" => return Err(FilterParseError("$options without $regex".into())),
            k => return Err(FilterParseError(format!("unknown field operator: {k}"))),
        };
        conditions.push(expr);
    }

    match conditions.len() {
        1 => Ok(conditions.remove(0)),
        _ => Ok(Expression::And(conditions)),
    }
}

fn operand_array(op: &str, operand: &Bson) -> Result<Vec<Bson>, FilterParseError> {
    match operand {
        Bson::Array(items) => Ok(items.clone()),
        _ => Err(FilterParseError(format!("{op} value must be an array"))),
    }
}

/// Parse a `$regex` + optional `$options` sub-document.
fn parse_regex(field: &str, doc: &Document) -> Result<Expression, FilterParseError> {
    let mut pattern: Option<&str> = None;
    let mut options: Option<&str> = None;

    for (key, value) in doc {
        match (key.as_str(), value) {
            ("$regex", Bson::String(s)) => pattern = Some(s),
            ("$regex", _) => return Err(FilterParseError("$regex value must be a string".into())),
            ("$options", Bson::String(s)) => options = Some(s),
            ("$options", _) => {
                return Err(FilterParseError("$options value must be a string".into()));
            }
            (k, _) => {
                return Err(FilterParseError(format!(
                    "unexpected key alongside $regex: {k}"
                )));
            }
        }
    }

    let pat = pattern.ok_or_else(|| FilterParseError("missing $regex pattern".into()))?;

    let full_pattern = match options {
        Some(opts) if !opts.is_empty() => {
            let mut prefix = String::with_capacity(4 + opts.len() + pat.len());
            prefix.push_str("(?");
            for ch in opts.chars() {
                match ch {
                    'i' | 's' | 'm' | 'x' => prefix.push(ch),
                    c => return Err(FilterParseError(format!("unknown regex option: {c}"))),
                }
            }
            prefix.push(')');
            prefix.push_str(pat);
            prefix
        }
        _ => pat.to_string(),
    };

    let re = Regex::new(&full_pattern)
        .map_err(|e| FilterParseError(format!("invalid regex pattern: {e}")))?;
    Ok(Expression::Regex(field.to_string(), re))
}

impl Expression {
    /// Evaluate whether a document matches this expression.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Expression::And(children) => children.iter().all(|c| c.matches(doc)),
            Expression::Or(children) => children.iter().any(|c| c.matches(doc)),
            Expression::Nor(children) => !children.iter().any(|c| c.matches(doc)),
            Expression::Eq(field, val) => eq_matches(doc, field, val),
            Expression::Ne(field, val) => !eq_matches(doc, field, val),
            Expression::Gt(field, val) => cmp_matches(doc, field, val, |o| o == Ordering::Greater),
            Expression::Gte(field, val) => cmp_matches(doc, field, val, |o| o != Ordering::Less),
            Expression::Lt(field, val) => cmp_matches(doc, field, val, |o| o == Ordering::Less),
            Expression::Lte(field, val) => cmp_matches(doc, field, val, |o| o != Ordering::Greater),
            Expression::In(field, vals) => vals.iter().any(|v| eq_matches(doc, field, v)),
            Expression::Nin(field, vals) => !vals.iter().any(|v| eq_matches(doc, field, v)),
            Expression::Regex(field, re) => candidates(doc, field).any(|v| match v {
                Bson::String(s) => re.is_match(s),
                _ => false,
            }),
            // $exists checks physical presence; a null value counts as present
            Expression::Exists(field, expected) => !lookup(doc, field).is_empty() == *expected,
        }
    }
}

/// Values at `field`, with array fields also contributing their elements.
fn candidates<'a>(doc: &'a Document, field: &str) -> impl Iterator<Item = &'a Bson> {
    lookup(doc, field).into_iter().flat_map(|v| {
        let elements: Box<dyn Iterator<Item = &'a Bson> + 'a> = match v {
            Bson::Array(items) => Box::new(std::iter::once(v).chain(items.iter())),
            _ => Box::new(std::iter::once(v)),
        };
        elements
    })
}

fn eq_matches(doc: &Document, field: &str, val: &Bson) -> bool {
    // $eq: null matches both missing fields and explicit null values
    if matches!(val, Bson::Null) {
        let found = lookup(doc, field);
        return found.is_empty() || found.iter().any(|v| matches!(v, Bson::Null));
    }
    candidates(doc, field).any(|v| values_equal(v, val))
}

fn cmp_matches(doc: &Document, field: &str, val: &Bson, predicate: fn(Ordering) -> bool) -> bool {
    // Range operators only compare values within the same type bracket;
    // NaN is only in range of NaN
    candidates(doc, field)
        .filter(|v| type_rank(v) == type_rank(val))
        .filter(|v| is_nan(v) == is_nan(val))
        .any(|v| predicate(compare_values(v, val)))
}

fn is_nan(value: &Bson) -> bool {
    matches!(value, Bson::Double(f) if f.is_nan())
}
