#![cfg(feature = "memory")]

use tessera_store::{MemoryStore, Store, StoreError, Transaction};

const CF: &str = "test";

fn mem_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.create_cf(CF).unwrap();
    store
}

#[test]
fn put_and_get() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"key1", b"value1").unwrap();
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    let result = txn.get(&cf, b"key1").unwrap().unwrap();
    assert_eq!(&*result, b"value1");
}

#[test]
fn get_missing_key_returns_none() {
    let store = mem_store();
    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    assert!(txn.get(&cf, b"nonexistent").unwrap().is_none());
}

#[test]
fn put_and_delete() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"key1", b"value1").unwrap();
    txn.commit().unwrap();

    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.delete(&cf, b"key1").unwrap();
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    assert!(txn.get(&cf, b"key1").unwrap().is_none());
}

#[test]
fn scan_prefix_returns_matching_pairs_in_order() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"d:b", b"2").unwrap();
    txn.put(&cf, b"d:a", b"1").unwrap();
    txn.put(&cf, b"i:a", b"x").unwrap();
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    let keys: Vec<Vec<u8>> = txn
        .scan_prefix(&cf, b"d:")
        .unwrap()
        .map(|r| r.unwrap().0)
        .collect();
    assert_eq!(keys, vec![b"d:a".to_vec(), b"d:b".to_vec()]);
}

#[test]
fn reads_see_own_writes() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"k", b"v").unwrap();
    assert_eq!(txn.get(&cf, b"k").unwrap().as_deref(), Some(&b"v"[..]));
}

#[test]
fn rollback_discards_writes() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"k", b"v").unwrap();
    txn.rollback().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    assert!(txn.get(&cf, b"k").unwrap().is_none());
}

#[test]
fn dropped_transaction_discards_writes() {
    let store = mem_store();
    {
        let txn = store.begin(false).unwrap();
        let cf = txn.cf(CF).unwrap();
        txn.put(&cf, b"k", b"v").unwrap();
    }

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    assert!(txn.get(&cf, b"k").unwrap().is_none());
}

#[test]
fn read_only_rejects_writes() {
    let store = mem_store();
    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    let err = txn.put(&cf, b"k", b"v").unwrap_err();
    assert!(matches!(err, StoreError::ReadOnly));
}

#[test]
fn unknown_cf_fails() {
    let store = mem_store();
    let txn = store.begin(true).unwrap();
    let err = txn.cf("missing").unwrap_err();
    assert!(matches!(err, StoreError::ColumnFamilyNotFound(name) if name == "missing"));
}

#[test]
fn snapshot_isolated_from_later_commits() {
    let store = mem_store();
    let reader = store.begin(true).unwrap();
    let read_cf = reader.cf(CF).unwrap();

    let writer = store.begin(false).unwrap();
    let cf = writer.cf(CF).unwrap();
    writer.put(&cf, b"k", b"v").unwrap();
    writer.commit().unwrap();

    assert!(reader.get(&read_cf, b"k").unwrap().is_none());
}

#[test]
fn create_and_drop_cf_in_transaction() {
    let store = MemoryStore::new();
    let mut txn = store.begin(false).unwrap();
    txn.create_cf("people").unwrap();
    let cf = txn.cf("people").unwrap();
    txn.put(&cf, b"k", b"v").unwrap();
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    assert!(txn.cf("people").is_ok());
    drop(txn);

    let mut txn = store.begin(false).unwrap();
    txn.drop_cf("people").unwrap();
    assert!(txn.cf("people").is_err());
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    assert!(txn.cf("people").is_err());
}

#[test]
fn create_cf_keeps_existing_data() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"k", b"v").unwrap();
    txn.commit().unwrap();

    let mut txn = store.begin(false).unwrap();
    txn.create_cf(CF).unwrap();
    let cf = txn.cf(CF).unwrap();
    assert!(txn.get(&cf, b"k").unwrap().is_some());
}

#[test]
fn drop_then_create_starts_empty() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"k", b"v").unwrap();
    txn.commit().unwrap();

    let mut txn = store.begin(false).unwrap();
    txn.drop_cf(CF).unwrap();
    txn.create_cf(CF).unwrap();
    let cf = txn.cf(CF).unwrap();
    assert!(txn.get(&cf, b"k").unwrap().is_none());
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    assert!(txn.get(&cf, b"k").unwrap().is_none());
}
