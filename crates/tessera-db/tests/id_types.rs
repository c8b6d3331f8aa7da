mod common;
use common::*;

use bson::oid::ObjectId;
use bson::{Bson, doc};
use tessera_db::{DbError, FindOptions, WriteConcern};

// ── _id type roundtrips ─────────────────────────────────────────

#[test]
fn insert_and_find_string_id() {
    let db = temp_db();
    db.insert(COLLECTION, vec![doc! { "_id": "my-string", "v": 1 }], &WriteConcern::SAFE)
        .unwrap();

    let found = db
        .find_one(COLLECTION, &FindOptions::filter(doc! { "_id": "my-string" }))
        .unwrap()
        .unwrap();
    assert_eq!(found.get_str("_id").unwrap(), "my-string");
}

#[test]
fn insert_and_find_objectid_id() {
    let db = temp_db();
    let oid = ObjectId::new();
    db.insert(COLLECTION, vec![doc! { "_id": oid, "v": 1 }], &WriteConcern::SAFE)
        .unwrap();

    let found = db
        .find_by_id(COLLECTION, &Bson::ObjectId(oid))
        .unwrap()
        .unwrap();
    assert_eq!(found.get_object_id("_id").unwrap(), oid);
}

#[test]
fn insert_and_find_int_id() {
    let db = temp_db();
    db.insert(COLLECTION, vec![doc! { "_id": 122, "name": "Robert" }], &WriteConcern::SAFE)
        .unwrap();

    let found = db
        .find_by_id(COLLECTION, &Bson::Int32(122))
        .unwrap()
        .unwrap();
    assert_eq!(found.get_i32("_id").unwrap(), 122);
}

#[test]
fn numeric_ids_collide_across_widths() {
    let db = temp_db();
    db.insert(COLLECTION, vec![doc! { "_id": 122 }], &WriteConcern::SAFE)
        .unwrap();

    for id in [Bson::Int64(122), Bson::Double(122.0)] {
        let err = db
            .insert(COLLECTION, vec![doc! { "_id": id.clone() }], &WriteConcern::SAFE)
            .unwrap_err();
        assert!(err.is_duplicate_key(), "{id:?}");
    }
    assert!(db.find_by_id(COLLECTION, &Bson::Int64(122)).unwrap().is_some());
}

#[test]
fn embedded_document_id() {
    let db = temp_db();
    let id = doc! { "lat": 48.85, "lng": 2.35 };
    db.insert(COLLECTION, vec![doc! { "_id": id.clone() }], &WriteConcern::SAFE)
        .unwrap();

    let found = db
        .find_by_id(COLLECTION, &Bson::Document(id))
        .unwrap();
    assert!(found.is_some());
}

#[test]
fn array_id_rejected() {
    let db = temp_db();
    let err = db
        .insert(COLLECTION, vec![doc! { "_id": [1, 2] }], &WriteConcern::SAFE)
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidId(_)));
}

#[test]
fn embedded_ids_collide_across_widths() {
    let db = temp_db();
    db.insert(COLLECTION, vec![doc! { "_id": { "a": 1_i32 } }], &WriteConcern::SAFE)
        .unwrap();

    for id in [doc! { "a": 1_i64 }, doc! { "a": 1.0 }] {
        let err = db
            .insert(COLLECTION, vec![doc! { "_id": id.clone() }], &WriteConcern::SAFE)
            .unwrap_err();
        assert!(err.is_duplicate_key(), "{id:?}");
    }

    assert_eq!(db.count(COLLECTION, &doc! { "_id": { "a": 1 } }).unwrap(), 1);
    let found = db
        .find_by_id(COLLECTION, &Bson::Document(doc! { "a": 1.0 }))
        .unwrap();
    assert!(found.is_some());
}

#[test]
fn embedded_id_with_array() {
    let db = temp_db();
    let id = doc! { "tags": [1, "x"] };
    db.insert(COLLECTION, vec![doc! { "_id": id.clone() }], &WriteConcern::SAFE)
        .unwrap();

    let err = db
        .insert(
            COLLECTION,
            vec![doc! { "_id": { "tags": [1_i64, "x"] } }],
            &WriteConcern::SAFE,
        )
        .unwrap_err();
    assert!(err.is_duplicate_key());
    assert!(db.find_by_id(COLLECTION, &Bson::Document(id)).unwrap().is_some());
}
