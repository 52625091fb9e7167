//! Garbage Collection Tests
//!
//! GC removes only versions no live snapshot can read.

use crate::*;
use std::time::Duration;

#[test]
fn test_gc_without_readers_keeps_latest() {
    let db = create_db();
    for v in 1..=5 {
        commit_one(&db, "a", v);
    }
    commit_one(&db, "b", 1);

    let stats = db.gc();
    assert_eq!(stats.safe_version, 6);
    assert_eq!(stats.versions_removed, 4);
    assert_eq!(db.history(&key("a")), vec![(5, Some(5))]);
    assert_eq!(db.version_count(), 2);
}

#[test]
fn test_gc_preserves_oldest_snapshot_view() {
    let db = create_db();
    commit_one(&db, "a", 1);
    commit_one(&db, "a", 2);
    let old = db.begin_transaction();
    commit_one(&db, "a", 3);
    commit_one(&db, "a", 4);

    db.gc();
    assert_eq!(db.read(old, &key("a")).unwrap(), Some(2));
    assert_eq!(
        db.history(&key("a")),
        vec![(2, Some(2)), (3, Some(3)), (4, Some(4))]
    );

    db.rollback(old).unwrap();
    db.gc();
    assert_eq!(db.history(&key("a")), vec![(4, Some(4))]);
}

#[test]
fn test_gc_reclaims_deleted_keys() {
    let db = create_db();
    commit_one(&db, "a", 1);
    let t = db.begin_transaction();
    db.delete(t, key("a")).unwrap();
    db.commit(t).unwrap();
    assert_eq!(db.key_count(), 1);

    let stats = db.gc();
    assert_eq!(stats.keys_removed, 1);
    assert_eq!(db.key_count(), 0);

    let r = db.begin_transaction();
    assert_eq!(db.read(r, &key("a")).unwrap(), None);
}

#[test]
fn test_gc_keeps_tombstone_visible_to_reader() {
    let db = create_db();
    commit_one(&db, "a", 1);
    let t = db.begin_transaction();
    db.delete(t, key("a")).unwrap();
    db.commit(t).unwrap();
    let reader = db.begin_transaction();
    commit_one(&db, "a", 7);

    db.gc();
    assert_eq!(db.read(reader, &key("a")).unwrap(), None);
    assert_eq!(db.history(&key("a")), vec![(2, None), (3, Some(7))]);
}

#[test]
fn test_gc_is_idempotent() {
    let db = create_db();
    commit_one(&db, "a", 1);
    commit_one(&db, "a", 2);
    assert!(!db.gc().is_noop());
    assert!(db.gc().is_noop());
}

#[test]
fn test_write_after_gc_still_detects_conflicts() {
    let db = create_db();
    commit_one(&db, "a", 1);
    let stale = db.begin_transaction();
    commit_one(&db, "a", 2);
    db.gc();

    db.write(stale, key("a"), 3).unwrap();
    assert!(db.commit(stale).unwrap().is_aborted());
}

#[test]
fn test_gc_every_policy() {
    init_tracing();
    let db: SnapKv<String, i64> = SnapKvBuilder::new().gc_every(3).build().unwrap();
    for v in 1..=6 {
        commit_one(&db, "a", v);
    }
    assert_eq!(db.metrics().gc_runs, 2);
    assert_eq!(db.history(&key("a")), vec![(6, Some(6))]);
}

#[test]
fn test_background_maintenance_collects() {
    init_tracing();
    let db: SnapKv<String, i64> = SnapKvBuilder::new()
        .maintenance_interval(Duration::from_millis(5))
        .build()
        .unwrap();
    for v in 1..=10 {
        commit_one(&db, "a", v);
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while db.version_count() > 1 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    db.shutdown();
    assert_eq!(db.history(&key("a")), vec![(10, Some(10))]);
}
