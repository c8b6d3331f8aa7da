#![allow(dead_code)]

use bson::doc;
use tessera_db::{Database, DatabaseConfig, WriteConcern};
use tessera_store::MemoryStore;

pub const COLLECTION: &str = "accounts";

pub fn temp_db() -> Database<MemoryStore> {
    init_tracing();
    Database::open(MemoryStore::new(), DatabaseConfig::default()).unwrap()
}

pub fn temp_db_with(write_concern: WriteConcern) -> Database<MemoryStore> {
    init_tracing();
    Database::open(MemoryStore::new(), DatabaseConfig { write_concern }).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Insert 5 seed records.
pub fn seed_records(db: &Database<MemoryStore>) {
    let mut txn = db.begin(false).unwrap();
    let outcome = txn.insert_many(
        COLLECTION,
        vec![
            doc! { "_id": "acct-1", "name": "Acme Corp", "revenue": 50000.0, "status": "active", "active": true },
            doc! { "_id": "acct-2", "name": "Globex", "revenue": 80000.0, "status": "snoozed", "active": true },
            doc! { "_id": "acct-3", "name": "Initech", "revenue": 12000.0, "status": "rejected", "active": false },
            doc! { "_id": "acct-4", "name": "Umbrella", "revenue": 95000.0, "status": "active", "active": true },
            doc! { "_id": "acct-5", "name": "Stark Industries", "revenue": 200000.0, "status": "active", "active": false },
        ],
    );
    assert!(outcome.error.is_none());
    txn.commit().unwrap();
}
