mod common;
use common::*;

use bson::doc;
use std::time::Duration;
use tessera_db::{Acknowledgment, DbError, UpdateOptions, WriteConcern};

// ── Concern propagation ─────────────────────────────────────────

#[test]
fn result_echoes_concern() {
    let db = temp_db();
    let concern = WriteConcern::MAJORITY.with_wtimeout(Duration::from_secs(2));

    let result = db
        .insert(COLLECTION, vec![doc! { "name": "John" }], &concern)
        .unwrap();
    assert_eq!(result.last_concern, concern);
    assert_eq!(result.last_concern.w, Acknowledgment::Majority);
    assert_eq!(result.last_concern.wtimeout_ms, Some(2000));
}

#[test]
fn journaled_write_is_acknowledged() {
    let db = temp_db();
    let result = db
        .insert(COLLECTION, vec![doc! { "name": "John" }], &WriteConcern::JOURNALED)
        .unwrap();
    assert!(result.acknowledged);
    assert_eq!(result.n, 1);
    assert!(result.last_concern.journal);
}

#[test]
fn default_concern_comes_from_config() {
    let db = temp_db_with(WriteConcern::JOURNALED);
    assert_eq!(db.default_write_concern(), WriteConcern::JOURNALED);
    assert_eq!(temp_db().default_write_concern(), WriteConcern::ACKNOWLEDGED);
}

// ── Unacknowledged ──────────────────────────────────────────────

#[test]
fn unacknowledged_reports_zero() {
    let db = temp_db();
    let result = db
        .insert(
            COLLECTION,
            vec![doc! { "name": "John" }],
            &WriteConcern::UNACKNOWLEDGED,
        )
        .unwrap();

    assert_eq!(result.n, 0);
    assert!(!result.acknowledged);
    assert_eq!(result.last_concern, WriteConcern::UNACKNOWLEDGED);
    assert_eq!(db.count(COLLECTION, &doc! {}).unwrap(), 1);
}

#[test]
fn unacknowledged_swallows_duplicate_key() {
    let db = temp_db();
    db.insert(COLLECTION, vec![doc! { "_id": 1 }], &WriteConcern::SAFE)
        .unwrap();

    let result = db
        .insert(
            COLLECTION,
            vec![doc! { "_id": 1 }],
            &WriteConcern::UNACKNOWLEDGED,
        )
        .unwrap();
    assert_eq!(result.n, 0);
    assert_eq!(db.count(COLLECTION, &doc! {}).unwrap(), 1);
}

#[test]
fn unacknowledged_update_reports_zero() {
    let db = temp_db();
    seed_records(&db);

    let result = db
        .update(
            COLLECTION,
            &doc! {},
            &doc! { "$set": { "flag": true } },
            UpdateOptions {
                multi: true,
                ..Default::default()
            },
            &WriteConcern::UNACKNOWLEDGED,
        )
        .unwrap();
    assert_eq!(result.n, 0);
    assert!(!result.updated_existing);
    assert_eq!(db.count(COLLECTION, &doc! { "flag": true }).unwrap(), 5);
}

#[test]
fn unacknowledged_with_journal_is_rejected() {
    let db = temp_db();
    let concern = WriteConcern::UNACKNOWLEDGED.with_journal(true);

    let err = db
        .insert(COLLECTION, vec![doc! { "name": "John" }], &concern)
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidWriteConcern(_)));
    assert_eq!(db.count(COLLECTION, &doc! {}).unwrap(), 0);
}

#[test]
fn write_concern_deserializes() {
    let concern: WriteConcern =
        bson::deserialize_from_document(doc! { "w": { "nodes": 2 }, "journal": true }).unwrap();
    assert_eq!(concern, WriteConcern::nodes(2).with_journal(true));

    let concern: WriteConcern = bson::deserialize_from_document(doc! { "w": "majority" }).unwrap();
    assert_eq!(concern, WriteConcern::MAJORITY);
}
