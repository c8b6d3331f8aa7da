//! Relaxed-JSON query templates with positional `#` placeholders.
//!
//! Templates follow the shell dialect used by most document mappers:
//!
//! - keys may be bare (`{name: 1}`), single- or double-quoted, or `#`
//! - strings may use either quote style
//! - `/pattern/flags` becomes a `{ $regex, $options }` sub-document
//! - `{ $oid: '...' }` and `{ $date: ... }` are folded into native BSON values
//!
//! Every `#` consumes the next parameter, left to right.

use bson::oid::ObjectId;
use bson::{Bson, Document};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("template syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("not enough parameters: placeholder at offset {offset} has no value ({provided} provided)")]
    MissingParameter { offset: usize, provided: usize },
    #[error("too many parameters: template has {placeholders} placeholder(s), {provided} provided")]
    UnusedParameters { placeholders: usize, provided: usize },
    #[error("placeholder at offset {offset} expects {expected}, got {found:?}")]
    ParameterType {
        offset: usize,
        expected: &'static str,
        found: bson::spec::ElementType,
    },
}

/// Bind `params` into `template` and return the resulting document.
///
/// A blank template binds to the empty document.
pub fn bind(template: &str, params: &[Bson]) -> Result<Document, TemplateError> {
    let mut parser = Parser::new(template, params);
    parser.skip_ws();
    if parser.at_end() {
        return match params.len() {
            0 => Ok(Document::new()),
            n => Err(TemplateError::UnusedParameters {
                placeholders: 0,
                provided: n,
            }),
        };
    }

    let start = parser.pos;
    let value = parser.parse_value()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.syntax("unexpected trailing characters"));
    }
    if parser.next_param != params.len() {
        return Err(TemplateError::UnusedParameters {
            placeholders: parser.next_param,
            provided: params.len(),
        });
    }

    match value {
        Bson::Document(doc) => Ok(doc),
        other => Err(TemplateError::Syntax {
            offset: start,
            message: format!("template must describe a document, got {:?}", other.element_type()),
        }),
    }
}

struct Parser<'t, 'p> {
    src: &'t str,
    pos: usize,
    params: &'p [Bson],
    next_param: usize,
}

impl<'t, 'p> Parser<'t, 'p> {
    fn new(src: &'t str, params: &'p [Bson]) -> Self {
        Self {
            src,
            pos: 0,
            params,
            next_param: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn syntax(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), TemplateError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(self.syntax(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.syntax(format!("expected '{expected}', found end of template"))),
        }
    }

    fn take_param(&mut self, offset: usize) -> Result<Bson, TemplateError> {
        let value = self
            .params
            .get(self.next_param)
            .cloned()
            .ok_or(TemplateError::MissingParameter {
                offset,
                provided: self.params.len(),
            })?;
        self.next_param += 1;
        Ok(value)
    }

    fn parse_value(&mut self) -> Result<Bson, TemplateError> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some(q @ ('\'' | '"')) => self.parse_string(q).map(Bson::String),
            Some('#') => {
                let offset = self.pos;
                self.bump();
                self.take_param(offset)
            }
            Some('/') => self.parse_regex(),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.parse_number(),
            Some(c) if is_ident_char(c) => self.parse_keyword(),
            Some(c) => Err(self.syntax(format!("unexpected character '{c}'"))),
            None => Err(self.syntax("unexpected end of template")),
        }
    }

    fn parse_object(&mut self) -> Result<Bson, TemplateError> {
        self.expect('{')?;
        let mut doc = Document::new();

        self.skip_ws();
        if self.peek() == Some('}') {
            self.bump();
            return Ok(Bson::Document(doc));
        }

        loop {
            let key = self.parse_key()?;
            self.expect(':')?;
            let value = self.parse_value()?;
            doc.insert(key, value);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                Some(c) => {
                    self.pos -= c.len_utf8();
                    return Err(self.syntax(format!("expected ',' or '}}', found '{c}'")));
                }
                None => return Err(self.syntax("unterminated object")),
            }
        }

        fold_extended_json(doc, self.pos)
    }

    fn parse_key(&mut self) -> Result<String, TemplateError> {
        self.skip_ws();
        let offset = self.pos;
        match self.peek() {
            Some(q @ ('\'' | '"')) => self.parse_string(q),
            Some('#') => {
                self.bump();
                match self.take_param(offset)? {
                    Bson::String(s) => Ok(s),
                    other => Err(TemplateError::ParameterType {
                        offset,
                        expected: "a string key",
                        found: other.element_type(),
                    }),
                }
            }
            Some(c) if is_ident_char(c) => Ok(self.take_ident().to_string()),
            Some(c) => Err(self.syntax(format!("expected a key, found '{c}'"))),
            None => Err(self.syntax("expected a key, found end of template")),
        }
    }

    fn parse_array(&mut self) -> Result<Bson, TemplateError> {
        self.expect('[')?;
        let mut items = Vec::new();

        self.skip_ws();
        if self.peek() == Some(']') {
            self.bump();
            return Ok(Bson::Array(items));
        }

        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => break,
                Some(c) => {
                    self.pos -= c.len_utf8();
                    return Err(self.syntax(format!("expected ',' or ']', found '{c}'")));
                }
                None => return Err(self.syntax("unterminated array")),
            }
        }

        Ok(Bson::Array(items))
    }

    fn parse_string(&mut self, quote: char) -> Result<String, TemplateError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.syntax("unterminated escape sequence"))?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'u' => out.push(self.parse_unicode_escape()?),
                        other => out.push(other),
                    }
                }
                Some(c) => out.push(c),
                None => return Err(self.syntax("unterminated string")),
            }
        }
    }

    fn parse_unicode_escape(&mut self) -> Result<char, TemplateError> {
        let end = self.pos + 4;
        let hex = self
            .src
            .get(self.pos..end)
            .ok_or_else(|| self.syntax("truncated \\u escape"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.syntax("invalid \\u escape"))?;
        let c = char::from_u32(code).ok_or_else(|| self.syntax("invalid unicode code point"))?;
        self.pos = end;
        Ok(c)
    }

    fn parse_number(&mut self) -> Result<Bson, TemplateError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        let is_float = text.contains(['.', 'e', 'E']);
        let invalid = || TemplateError::Syntax {
            offset: start,
            message: format!("invalid number '{text}'"),
        };

        if is_float {
            return text.parse::<f64>().map(Bson::Double).map_err(|_| invalid());
        }
        let n = text.parse::<i64>().map_err(|_| invalid())?;
        Ok(match i32::try_from(n) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(n),
        })
    }

    fn parse_keyword(&mut self) -> Result<Bson, TemplateError> {
        let start = self.pos;
        match self.take_ident() {
            "true" => Ok(Bson::Boolean(true)),
            "false" => Ok(Bson::Boolean(false)),
            "null" => Ok(Bson::Null),
            other => Err(TemplateError::Syntax {
                offset: start,
                message: format!("unknown literal '{other}'"),
            }),
        }
    }

    fn parse_regex(&mut self) -> Result<Bson, TemplateError> {
        self.bump();
        let mut pattern = String::new();
        loop {
            match self.bump() {
                Some('/') => break,
                Some('\\') => match self.bump() {
                    Some('/') => pattern.push('/'),
                    Some(c) => {
                        pattern.push('\\');
                        pattern.push(c);
                    }
                    None => return Err(self.syntax("unterminated regex")),
                },
                Some(c) => pattern.push(c),
                None => return Err(self.syntax("unterminated regex")),
            }
        }

        let mut options = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_alphabetic() {
                break;
            }
            options.push(c);
            self.pos += 1;
        }

        let mut doc = Document::new();
        doc.insert("$regex", pattern);
        if !options.is_empty() {
            doc.insert("$options", options);
        }
        Ok(Bson::Document(doc))
    }

    fn take_ident(&mut self) -> &'t str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_ident_char(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.')
}

/// Fold `{ $oid: .. }` / `{ $date: .. }` wrappers into native values.
fn fold_extended_json(doc: Document, offset: usize) -> Result<Bson, TemplateError> {
    if doc.len() != 1 {
        return Ok(Bson::Document(doc));
    }
    let invalid = |message: String| TemplateError::Syntax { offset, message };

    match (doc.get("$oid"), doc.get("$date")) {
        (Some(Bson::String(hex)), _) => ObjectId::parse_str(hex)
            .map(Bson::ObjectId)
            .map_err(|e| invalid(format!("invalid $oid: {e}"))),
        (_, Some(date)) => {
            let millis = match date {
                Bson::Int32(n) => i64::from(*n),
                Bson::Int64(n) => *n,
                Bson::Double(f) => *f as i64,
                Bson::String(s) => bson::DateTime::parse_rfc3339_str(s)
                    .map_err(|e| invalid(format!("invalid $date: {e}")))?
                    .timestamp_millis(),
                other => {
                    return Err(invalid(format!(
                        "$date expects millis or an RFC 3339 string, got {:?}",
                        other.element_type()
                    )));
                }
            };
            Ok(Bson::DateTime(bson::DateTime::from_millis(millis)))
        }
        _ => Ok(Bson::Document(doc)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn bare_keys_and_single_quotes() {
        let doc = bind("{name : 'Abby'}", &[]).unwrap();
        assert_eq!(doc, doc! { "name": "Abby" });
    }

    #[test]
    fn positional_parameter() {
        let doc = bind("{name : #}", &[Bson::String("Abby".into())]).unwrap();
        assert_eq!(doc, doc! { "name": "Abby" });
    }

    #[test]
    fn parameters_bind_left_to_right() {
        let doc = bind(
            "{a: #, b: {$gt: #}, c: [#, 3]}",
            &[Bson::Int32(1), Bson::Int64(2), Bson::Boolean(true)],
        )
        .unwrap();
        assert_eq!(doc, doc! { "a": 1, "b": { "$gt": 2_i64 }, "c": [true, 3] });
    }

    #[test]
    fn document_parameter_nests() {
        let sub = doc! { "value": "newValue" };
        let doc = bind("{$set: {subBean: #}}", &[Bson::Document(sub.clone())]).unwrap();
        assert_eq!(doc, doc! { "$set": { "subBean": sub } });
    }

    #[test]
    fn parameter_as_key() {
        let doc = bind("{#: 1}", &[Bson::String("age".into())]).unwrap();
        assert_eq!(doc, doc! { "age": 1 });
    }

    #[test]
    fn non_string_key_parameter_errors() {
        let err = bind("{#: 1}", &[Bson::Int32(4)]).unwrap_err();
        assert!(matches!(err, TemplateError::ParameterType { offset: 1, .. }));
    }

    #[test]
    fn whole_template_placeholder() {
        let query = doc! { "name": "John" };
        let doc = bind("#", &[Bson::Document(query.clone())]).unwrap();
        assert_eq!(doc, query);
    }

    #[test]
    fn blank_template_is_empty_document() {
        assert_eq!(bind("   ", &[]).unwrap(), Document::new());
        assert_eq!(bind("{}", &[]).unwrap(), Document::new());
    }

    #[test]
    fn missing_parameter_errors() {
        let err = bind("{a: #, b: #}", &[Bson::Int32(1)]).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingParameter {
                offset: 10,
                provided: 1
            }
        );
    }

    #[test]
    fn extra_parameter_errors() {
        let err = bind("{a: #}", &[Bson::Int32(1), Bson::Int32(2)]).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnusedParameters {
                placeholders: 1,
                provided: 2
            }
        );
    }

    #[test]
    fn numbers_pick_narrowest_type() {
        let doc = bind("{a: 12, b: 3000000000, c: -1.5, d: 2e3}", &[]).unwrap();
        assert_eq!(doc.get("a"), Some(&Bson::Int32(12)));
        assert_eq!(doc.get("b"), Some(&Bson::Int64(3_000_000_000)));
        assert_eq!(doc.get("c"), Some(&Bson::Double(-1.5)));
        assert_eq!(doc.get("d"), Some(&Bson::Double(2000.0)));
    }

    #[test]
    fn keywords_and_escapes() {
        let doc = bind(r#"{"a b": true, c: null, d: 'it\'s', e: "A"}"#, &[]).unwrap();
        assert_eq!(doc, doc! { "a b": true, "c": null, "d": "it's", "e": "A" });
    }

    #[test]
    fn regex_literal_becomes_operator_document() {
        let doc = bind("{name: /^jo\\/hn/i}", &[]).unwrap();
        assert_eq!(doc, doc! { "name": { "$regex": "^jo/hn", "$options": "i" } });
    }

    #[test]
    fn extended_json_object_id() {
        let oid = ObjectId::new();
        let doc = bind(&format!("{{_id: {{$oid: '{}'}}}}", oid.to_hex()), &[]).unwrap();
        assert_eq!(doc, doc! { "_id": oid });
    }

    #[test]
    fn extended_json_date() {
        let doc = bind("{at: {$date: 1000}}", &[]).unwrap();
        assert_eq!(doc, doc! { "at": bson::DateTime::from_millis(1000) });
    }

    #[test]
    fn dotted_and_operator_keys() {
        let doc = bind("{'address.city': 'Paris', $or: [{a: 1}, {b: 2}]}", &[]).unwrap();
        assert_eq!(
            doc,
            doc! { "address.city": "Paris", "$or": [{ "a": 1 }, { "b": 2 }] }
        );
    }

    #[test]
    fn syntax_error_reports_offset() {
        let err = bind("{name 'Abby'}", &[]).unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { offset: 6, .. }), "{err}");
    }

    #[test]
    fn trailing_garbage_errors() {
        let err = bind("{a: 1} x", &[]).unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { offset: 7, .. }), "{err}");
    }

    #[test]
    fn scalar_template_errors() {
        let err = bind("42", &[]).unwrap_err();
        assert!(err.to_string().contains("must describe a document"));
    }

    #[test]
    fn unknown_literal_errors() {
        let err = bind("{a: undefinedish}", &[]).unwrap_err();
        assert!(err.to_string().contains("unknown literal"));
    }
}
