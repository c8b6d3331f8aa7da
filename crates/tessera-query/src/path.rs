use bson::{Bson, Document};

/// Collect every value reachable at a dotted `path`.
///
/// Arrays met along the way fan out: `tags.name` over `{tags: [{name: a}, {name: b}]}`
/// yields both names. A numeric segment also indexes into an array.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((first, rest)) = segments.split_first() {
        if let Some(value) = doc.get(*first) {
            walk(value, rest, &mut out);
        }
    }
    out
}

fn walk<'a>(value: &'a Bson, segments: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match value {
        Bson::Document(doc) => {
            if let Some(next) = doc.get(*segment) {
                walk(next, rest, out);
            }
        }
        Bson::Array(items) => {
            if let Ok(index) = segment.parse::<usize>() {
                if let Some(item) = items.get(index) {
                    walk(item, rest, out);
                }
                return;
            }
            for item in items {
                if matches!(item, Bson::Document(_)) {
                    walk(item, segments, out);
                }
            }
        }
        _ => {}
    }
}
