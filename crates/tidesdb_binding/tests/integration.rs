//! End-to-end tests of the binding against the reference engine.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::{tempdir, TempDir};
use tidesdb_binding::{
    codes, ColumnFamilyConfig, Database, EngineErrorCode, Status, TransactionState, NO_EXPIRY,
};
use tidesdb_engine::tidesdb_alloc_stats;

const CF: &str = "users";

fn path(dir: &TempDir) -> &str {
    dir.path().to_str().unwrap()
}

fn open_with_cf(dir: &TempDir) -> Database {
    let db = Database::open(path(dir)).unwrap();
    db.create_column_family_with(CF, &ColumnFamilyConfig::default())
        .unwrap();
    db
}

fn not_found(status: &Status) -> bool {
    status.code == EngineErrorCode::NotFound as i32
}

#[test]
fn open_close_round_trip() {
    let dir = tempdir().unwrap();

    let db = Database::open(path(&dir)).unwrap();
    db.create_column_family_with(CF, &ColumnFamilyConfig::default())
        .unwrap();
    db.create_column_family_with("events", &ColumnFamilyConfig::new().bloom_filter(true))
        .unwrap();
    db.put(CF, b"alice", b"admin", NO_EXPIRY).unwrap();
    assert_eq!(Status::pair(&db.close()), (0, "OK".to_string()));

    let db = Database::open(path(&dir)).unwrap();
    assert_eq!(db.column_families().unwrap(), vec!["events", CF]);
    assert_eq!(db.get(CF, b"alice").unwrap(), b"admin");
    db.close().unwrap();
}

#[test]
fn put_get_round_trip() {
    let dir = tempdir().unwrap();
    let db = open_with_cf(&dir);

    db.put(CF, b"k", b"v", NO_EXPIRY).unwrap();
    let result = db.get(CF, b"k");
    assert_eq!(Status::pair(&result).0, codes::OK);
    assert_eq!(result.unwrap(), b"v");

    db.put(CF, b"k", b"v2", NO_EXPIRY).unwrap();
    assert_eq!(db.get(CF, b"k").unwrap(), b"v2");
}

#[test]
fn delete_semantics() {
    let dir = tempdir().unwrap();
    let db = open_with_cf(&dir);

    db.put(CF, b"k", b"v", NO_EXPIRY).unwrap();
    db.delete(CF, b"k").unwrap();
    assert!(not_found(&db.get(CF, b"k").unwrap_err()));

    db.delete(CF, b"never-written").unwrap();
}

#[test]
fn ttl_expiry() {
    let dir = tempdir().unwrap();
    let db = open_with_cf(&dir);

    db.put(CF, b"short", b"v", 1).unwrap();
    db.put(CF, b"forever", b"v", NO_EXPIRY).unwrap();
    assert_eq!(db.get(CF, b"short").unwrap(), b"v");

    thread::sleep(Duration::from_millis(2100));

    assert!(not_found(&db.get(CF, b"short").unwrap_err()));
    assert_eq!(db.get(CF, b"forever").unwrap(), b"v");
}

#[test]
fn ttl_reaching_before_epoch_is_expired() {
    let dir = tempdir().unwrap();
    let db = open_with_cf(&dir);
    let now = i64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs(),
    )
    .unwrap();

    // Lands one second before the epoch, next to the never-expires marker.
    db.put(CF, b"k", b"v", -(now + 1)).unwrap();
    assert!(not_found(&db.get(CF, b"k").unwrap_err()));

    db.put(CF, b"k", b"v", i64::MIN).unwrap();
    assert!(not_found(&db.get(CF, b"k").unwrap_err()));
}

#[test]
fn transaction_rollback_leaves_keys_absent() {
    let dir = tempdir().unwrap();
    let db = open_with_cf(&dir);

    let txn = db.begin_transaction(CF).unwrap();
    txn.put(b"a", b"1", NO_EXPIRY).unwrap();
    txn.put(b"b", b"2", NO_EXPIRY).unwrap();
    txn.rollback().unwrap();
    txn.free().unwrap();

    assert!(not_found(&db.get(CF, b"a").unwrap_err()));
    assert!(not_found(&db.get(CF, b"b").unwrap_err()));
}

#[test]
fn transaction_commit_publishes_both_keys() {
    let dir = tempdir().unwrap();
    let db = open_with_cf(&dir);

    let txn = db.begin_transaction(CF).unwrap();
    txn.put(b"a", b"1", NO_EXPIRY).unwrap();
    txn.put(b"b", b"2", NO_EXPIRY).unwrap();
    txn.commit().unwrap();

    let second = txn.commit().unwrap_err();
    assert_eq!(second.code, codes::TXN_COMMITTED);
    assert!(second.is_usage_error());

    txn.free().unwrap();
    assert_eq!(txn.state(), TransactionState::Released);

    assert_eq!(db.get(CF, b"a").unwrap(), b"1");
    assert_eq!(db.get(CF, b"b").unwrap(), b"2");
}

#[test]
fn committed_transaction_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let db = open_with_cf(&dir);
        let txn = db.begin_transaction(CF).unwrap();
        txn.put(b"a", b"1", NO_EXPIRY).unwrap();
        txn.delete(b"missing").unwrap();
        txn.commit().unwrap();
        txn.free().unwrap();
        db.close().unwrap();
    }

    let db = Database::open(path(&dir)).unwrap();
    assert_eq!(db.get(CF, b"a").unwrap(), b"1");
    db.close().unwrap();
}

#[test]
fn committed_delete_removes_existing_key() {
    let dir = tempdir().unwrap();
    {
        let db = open_with_cf(&dir);
        db.put(CF, b"k", b"v", NO_EXPIRY).unwrap();
        db.put(CF, b"keep", b"v", NO_EXPIRY).unwrap();

        let txn = db.begin_transaction(CF).unwrap();
        txn.delete(b"k").unwrap();
        assert_eq!(db.get(CF, b"k").unwrap(), b"v");
        txn.commit().unwrap();
        txn.free().unwrap();

        assert!(not_found(&db.get(CF, b"k").unwrap_err()));
        db.close().unwrap();
    }

    let db = Database::open(path(&dir)).unwrap();
    assert!(not_found(&db.get(CF, b"k").unwrap_err()));
    assert_eq!(db.get(CF, b"keep").unwrap(), b"v");
    db.close().unwrap();
}

#[test]
fn delete_compacted_away_still_conflicts() {
    let dir = tempdir().unwrap();
    let db = open_with_cf(&dir);
    db.put(CF, b"k", b"v", NO_EXPIRY).unwrap();

    let txn = db.begin_transaction(CF).unwrap();
    txn.put(b"k", b"mine", NO_EXPIRY).unwrap();
    db.delete(CF, b"k").unwrap();
    db.compact_sstables(CF, 1).unwrap();

    let err = txn.commit().unwrap_err();
    assert_eq!(err.code, EngineErrorCode::Conflict as i32);
    assert_eq!(txn.state(), TransactionState::Failed);
    txn.free().unwrap();

    assert!(not_found(&db.get(CF, b"k").unwrap_err()));
    db.close().unwrap();
}

#[test]
fn independent_databases() {
    let first_dir = tempdir().unwrap();
    let second_dir = tempdir().unwrap();
    let first = open_with_cf(&first_dir);
    let second = open_with_cf(&second_dir);

    first.put(CF, b"k", b"first", NO_EXPIRY).unwrap();
    second.put(CF, b"k", b"second", NO_EXPIRY).unwrap();
    first.put(CF, b"only-first", b"1", NO_EXPIRY).unwrap();

    assert_eq!(first.get(CF, b"k").unwrap(), b"first");
    assert_eq!(second.get(CF, b"k").unwrap(), b"second");
    assert!(not_found(&second.get(CF, b"only-first").unwrap_err()));

    first.close().unwrap();
    assert_eq!(second.get(CF, b"k").unwrap(), b"second");
    assert_eq!(
        first.get(CF, b"k").unwrap_err().code,
        codes::DATABASE_CLOSED
    );
    second.close().unwrap();
}

#[test]
fn sessions_are_usable_across_threads() {
    let dir = tempdir().unwrap();
    let db = open_with_cf(&dir);

    thread::scope(|s| {
        for t in 0..4u8 {
            let db = &db;
            s.spawn(move || {
                for i in 0..25u8 {
                    db.put(CF, &[t, i], &[i], NO_EXPIRY).unwrap();
                }
            });
        }
    });

    for t in 0..4u8 {
        for i in 0..25u8 {
            assert_eq!(db.get(CF, &[t, i]).unwrap(), vec![i]);
        }
    }
}

#[test]
fn compaction_keeps_live_data() {
    let dir = tempdir().unwrap();
    let db = open_with_cf(&dir);

    for i in 0..100u32 {
        db.put(CF, &i.to_be_bytes(), b"value", NO_EXPIRY).unwrap();
    }
    for i in 0..50u32 {
        db.delete(CF, &i.to_be_bytes()).unwrap();
    }
    db.compact_sstables(CF, 4).unwrap();
    db.close().unwrap();

    let db = Database::open(path(&dir)).unwrap();
    assert!(not_found(&db.get(CF, &0u32.to_be_bytes()).unwrap_err()));
    assert_eq!(db.get(CF, &99u32.to_be_bytes()).unwrap(), b"value");
    db.close().unwrap();
}

#[test]
fn error_envelope_hygiene() {
    let dir = tempdir().unwrap();
    let before = tidesdb_alloc_stats();

    let db = open_with_cf(&dir);
    let failures = [
        db.get(CF, b"missing").map(|_| ()),
        db.get("no-such-cf", b"k").map(|_| ()),
        db.put(CF, b"", b"v", NO_EXPIRY),
        db.create_column_family_with(CF, &ColumnFamilyConfig::default()),
        db.drop_column_family("no-such-cf"),
        db.compact_sstables(CF, 0),
        db.begin_transaction("no-such-cf").map(|_| ()),
        Database::open(path(&dir)).map(|_| ()),
    ];
    for result in &failures {
        let status = result.as_ref().unwrap_err();
        assert!(!status.is_usage_error(), "{status}");
    }

    db.put(CF, b"k", b"v", NO_EXPIRY).unwrap();
    db.get(CF, b"k").unwrap();
    db.list_column_families().unwrap();

    let txn = db.begin_transaction(CF).unwrap();
    txn.put(b"", b"v", NO_EXPIRY).unwrap_err();
    txn.commit().unwrap();
    txn.commit().unwrap_err();
    txn.free().unwrap();
    txn.free().unwrap_err();

    db.close().unwrap();
    db.close().unwrap_err();

    let after = tidesdb_alloc_stats();
    let produced = after.errors_allocated - before.errors_allocated;
    let released = after.errors_freed - before.errors_freed;
    // Eight engine failures above plus the empty transactional key. Usage
    // errors never reach the engine.
    assert_eq!(produced, 9);
    assert_eq!(released, produced);
    assert_eq!(after.outstanding_buffers(), before.outstanding_buffers());
}
