//! Key encoding for record storage.
//!
//! Data layout: `d:{tag}{id_bytes}` → BSON-serialized document.
//!
//! Ids that MongoDB treats as equal must land on the same key, so integral
//! numbers share one tag regardless of width, at any depth. Every encoded
//! value is self-delimiting:
//!
//! - strings, keys and binary payloads escape `0x00` as `0x00 0xFF` and end
//!   with `0x00 0x00`
//! - documents and arrays write `0x01` before each entry and `0x00` at the end;
//!   a document entry is its escaped key followed by the encoded value

use bson::Bson;

use crate::error::DbError;

const DATA_PREFIX: &[u8] = b"d:";

const TAG_NULL: u8 = 0x05;
const TAG_INT: u8 = 0x10;
const TAG_DOUBLE: u8 = 0x11;
const TAG_STRING: u8 = 0x20;
const TAG_DOCUMENT: u8 = 0x30;
const TAG_OBJECT_ID: u8 = 0x40;
const TAG_BOOLEAN: u8 = 0x50;
const TAG_DATE: u8 = 0x60;
const TAG_BINARY: u8 = 0x70;
const TAG_TIMESTAMP: u8 = 0x80;
const TAG_ARRAY: u8 = 0x90;

const ENTRY: u8 = 0x01;
const END: u8 = 0x00;

/// Prefix shared by every record key.
pub fn data_prefix() -> &'static [u8] {
    DATA_PREFIX
}

/// Build a record key: `d:{encoded _id}`
pub fn record_key(id: &Bson) -> Result<Vec<u8>, DbError> {
    if let Bson::Array(_) = id {
        return Err(DbError::InvalidId("Array cannot be used as _id".into()));
    }
    let mut key = DATA_PREFIX.to_vec();
    encode_value(id, &mut key)?;
    Ok(key)
}

fn encode_value(id: &Bson, out: &mut Vec<u8>) -> Result<(), DbError> {
    match id {
        Bson::Null => out.push(TAG_NULL),
        Bson::Int32(i) => push_int(out, *i as i64),
        Bson::Int64(i) => push_int(out, *i),
        Bson::Double(f) if is_integral(*f) => push_int(out, *f as i64),
        Bson::Double(f) => {
            out.push(TAG_DOUBLE);
            let bits = if f.is_nan() { f64::NAN.to_bits() } else { f.to_bits() };
            // IEEE 754: flip all bits if negative, else flip sign bit only
            let sortable = if bits & (1u64 << 63) != 0 {
                !bits
            } else {
                bits ^ (1u64 << 63)
            };
            out.extend_from_slice(&sortable.to_be_bytes());
        }
        Bson::String(s) => {
            out.push(TAG_STRING);
            push_escaped(out, s.as_bytes());
        }
        Bson::Document(doc) => {
            out.push(TAG_DOCUMENT);
            for (key, value) in doc {
                out.push(ENTRY);
                push_escaped(out, key.as_bytes());
                encode_value(value, out)?;
            }
            out.push(END);
        }
        Bson::Array(items) => {
            out.push(TAG_ARRAY);
            for item in items {
                out.push(ENTRY);
                encode_value(item, out)?;
            }
            out.push(END);
        }
        Bson::ObjectId(oid) => {
            out.push(TAG_OBJECT_ID);
            out.extend_from_slice(&oid.bytes());
        }
        Bson::Boolean(b) => {
            out.push(TAG_BOOLEAN);
            out.push(*b as u8);
        }
        Bson::DateTime(dt) => {
            out.push(TAG_DATE);
            out.extend_from_slice(&flip_sign(dt.timestamp_millis()));
        }
        Bson::Binary(bin) => {
            out.push(TAG_BINARY);
            out.push(u8::from(bin.subtype));
            push_escaped(out, &bin.bytes);
        }
        Bson::Timestamp(ts) => {
            out.push(TAG_TIMESTAMP);
            out.extend_from_slice(&ts.time.to_be_bytes());
            out.extend_from_slice(&ts.increment.to_be_bytes());
        }
        other => {
            return Err(DbError::InvalidId(format!(
                "{:?} cannot be used as _id",
                other.element_type()
            )));
        }
    }
    Ok(())
}

fn push_escaped(out: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        out.push(b);
        if b == 0x00 {
            out.push(0xFF);
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
}

fn push_int(out: &mut Vec<u8>, value: i64) {
    out.push(TAG_INT);
    out.extend_from_slice(&flip_sign(value));
}

// Flip the sign bit so signed integers sort correctly as unsigned bytes
fn flip_sign(value: i64) -> [u8; 8] {
    ((value as u64) ^ (1u64 << 63)).to_be_bytes()
}

fn is_integral(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}
