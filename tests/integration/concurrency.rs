//! Concurrency Tests
//!
//! Many threads against one store: no lost updates, unique commit
//! versions, and no partially visible commits.

use crate::*;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_concurrent_increments_no_lost_updates() {
    const THREADS: usize = 8;
    const INCREMENTS: usize = 50;

    let db = create_shared_db();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut aborts = 0;
                for _ in 0..INCREMENTS {
                    loop {
                        let t = db.begin_transaction();
                        let current = db.read(t, &key("counter")).unwrap().unwrap_or(0);
                        db.write(t, key("counter"), current + 1).unwrap();
                        if db.commit(t).unwrap().is_committed() {
                            break;
                        }
                        aborts += 1;
                    }
                }
                aborts
            })
        })
        .collect();

    let aborts: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let t = db.begin_transaction();
    let total = (THREADS * INCREMENTS) as i64;
    assert_eq!(db.read(t, &key("counter")).unwrap(), Some(total));
    assert_eq!(db.current_version(), total as u64);

    let metrics = db.metrics();
    assert_eq!(metrics.committed, total as u64);
    assert_eq!(metrics.conflicts, aborts);
}

#[test]
fn test_concurrent_disjoint_commits_get_unique_versions() {
    const THREADS: usize = 8;
    const COMMITS: usize = 25;

    let db = create_shared_db();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..COMMITS)
                    .map(|n| {
                        let t = db.begin_transaction();
                        db.write(t, format!("t{}-{}", i, n), n as i64).unwrap();
                        db.commit(t).unwrap().version().unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let versions: Vec<Version> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<Version> = versions.iter().copied().collect();

    assert_eq!(unique.len(), THREADS * COMMITS);
    assert_eq!(unique.iter().max().copied(), Some((THREADS * COMMITS) as u64));
    assert_eq!(db.key_count(), THREADS * COMMITS);
}

#[test]
fn test_multi_key_commits_are_atomic_to_readers() {
    const WRITES: i64 = 200;

    let db = create_shared_db();
    let t = db.begin_transaction();
    db.write(t, key("left"), 0).unwrap();
    db.write(t, key("right"), 0).unwrap();
    db.commit(t).unwrap();

    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for n in 1..=WRITES {
                let t = db.begin_transaction();
                db.write(t, key("left"), n).unwrap();
                db.write(t, key("right"), n).unwrap();
                assert!(db.commit(t).unwrap().is_committed());
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for _ in 0..WRITES {
                    let t = db.begin_transaction();
                    let left = db.read(t, &key("left")).unwrap();
                    let right = db.read(t, &key("right")).unwrap();
                    assert_eq!(left, right, "torn read in {}", t);
                    db.rollback(t).unwrap();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
}

#[test]
fn test_gc_concurrent_with_readers() {
    const ROUNDS: i64 = 100;

    let db = create_shared_db();
    commit_one(&db, "k", 0);

    let collector = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                db.gc();
                thread::yield_now();
            }
        })
    };

    let worker = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for n in 1..=ROUNDS {
                let reader = db.begin_transaction();
                let before = db.read(reader, &key("k")).unwrap();
                commit_one(&db, "k", n);
                // Snapshot view survives the concurrent collector
                assert_eq!(db.read(reader, &key("k")).unwrap(), before);
                db.rollback(reader).unwrap();
            }
        })
    };

    collector.join().unwrap();
    worker.join().unwrap();

    db.gc();
    assert_eq!(db.history(&key("k")), vec![(ROUNDS as u64 + 1, Some(ROUNDS))]);
}

#[test]
fn test_closure_retry_under_contention() {
    const THREADS: usize = 4;
    const INCREMENTS: i64 = 20;

    init_tracing();
    let retry = RetryConfig::new()
        .with_max_retries(1_000)
        .with_base_delay_ms(0)
        .with_max_delay_ms(1);
    let db: Arc<SnapKv<String, i64>> =
        Arc::new(SnapKvBuilder::new().retry(retry).build().unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for _ in 0..INCREMENTS {
                    db.transaction_with_retry(|txn| {
                        let n = txn.get(&key("n"))?.unwrap_or(0);
                        txn.put(key("n"), n + 1)
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let t = db.begin_transaction();
    assert_eq!(
        db.read(t, &key("n")).unwrap(),
        Some(THREADS as i64 * INCREMENTS)
    );
}
