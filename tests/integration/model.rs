//! Model-Based Property Tests
//!
//! Random interleavings of begin / write / delete / commit / rollback / gc
//! are replayed against the store and against a naive model that keeps
//! every committed version forever. Every read must agree.

use crate::*;
use proptest::prelude::*;
use std::collections::HashMap;

const KEYS: u8 = 4;
const SLOTS: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    Begin(usize),
    Write(usize, u8, i64),
    Delete(usize, u8),
    Read(usize, u8),
    Commit(usize),
    Rollback(usize),
    Gc,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let slot = 0..SLOTS;
    let k = 0..KEYS;
    prop_oneof![
        2 => slot.clone().prop_map(Op::Begin),
        4 => (slot.clone(), k.clone(), any::<i64>()).prop_map(|(s, k, v)| Op::Write(s, k, v)),
        1 => (slot.clone(), k.clone()).prop_map(|(s, k)| Op::Delete(s, k)),
        4 => (slot.clone(), k).prop_map(|(s, k)| Op::Read(s, k)),
        2 => slot.clone().prop_map(Op::Commit),
        1 => slot.prop_map(Op::Rollback),
        1 => Just(Op::Gc),
    ]
}

/// Committed history with no pruning
#[derive(Default)]
struct Model {
    version: Version,
    history: HashMap<String, Vec<(Version, Option<i64>)>>,
}

impl Model {
    fn read_at(&self, key: &str, snapshot: Version) -> Option<i64> {
        self.history
            .get(key)
            .and_then(|h| h.iter().rev().find(|(v, _)| *v <= snapshot))
            .and_then(|(_, value)| *value)
    }

    fn latest(&self, key: &str) -> Version {
        self.history
            .get(key)
            .and_then(|h| h.last())
            .map(|(v, _)| *v)
            .unwrap_or(0)
    }
}

struct Open {
    id: TxnId,
    snapshot: Version,
    writes: HashMap<String, Option<i64>>,
}

fn key_name(k: u8) -> String {
    format!("key-{}", k)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_store_matches_model(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let db: SnapKv<String, i64> = SnapKv::new();
        let mut model = Model::default();
        let mut slots: Vec<Option<Open>> = (0..SLOTS).map(|_| None).collect();

        for op in ops {
            match op {
                Op::Begin(s) => {
                    if let Some(open) = slots[s].take() {
                        db.rollback(open.id).unwrap();
                    }
                    let id = db.begin_transaction();
                    let snapshot = db.transaction_info(id).unwrap().snapshot;
                    prop_assert_eq!(snapshot, model.version);
                    slots[s] = Some(Open { id, snapshot, writes: HashMap::new() });
                }
                Op::Write(s, k, v) => {
                    if let Some(open) = slots[s].as_mut() {
                        db.write(open.id, key_name(k), v).unwrap();
                        open.writes.insert(key_name(k), Some(v));
                    }
                }
                Op::Delete(s, k) => {
                    if let Some(open) = slots[s].as_mut() {
                        db.delete(open.id, key_name(k)).unwrap();
                        open.writes.insert(key_name(k), None);
                    }
                }
                Op::Read(s, k) => {
                    if let Some(open) = slots[s].as_ref() {
                        let name = key_name(k);
                        let expected = match open.writes.get(&name) {
                            Some(buffered) => *buffered,
                            None => model.read_at(&name, open.snapshot),
                        };
                        prop_assert_eq!(db.read(open.id, &name).unwrap(), expected);
                    }
                }
                Op::Commit(s) => {
                    if let Some(open) = slots[s].take() {
                        let outcome = db.commit(open.id).unwrap();
                        let mut stale: Vec<String> = open
                            .writes
                            .keys()
                            .filter(|k| model.latest(k) > open.snapshot)
                            .cloned()
                            .collect();
                        stale.sort();

                        if open.writes.is_empty() {
                            prop_assert_eq!(outcome, CommitOutcome::ReadOnly { snapshot: open.snapshot });
                        } else if !stale.is_empty() {
                            match outcome {
                                CommitOutcome::Aborted { mut conflicts } => {
                                    conflicts.sort();
                                    prop_assert_eq!(conflicts, stale);
                                }
                                other => prop_assert!(false, "expected abort, got {:?}", other),
                            }
                        } else {
                            model.version += 1;
                            prop_assert_eq!(outcome, CommitOutcome::Committed { version: model.version });
                            for (k, v) in open.writes {
                                model.history.entry(k).or_default().push((model.version, v));
                            }
                        }
                    }
                }
                Op::Rollback(s) => {
                    if let Some(open) = slots[s].take() {
                        db.rollback(open.id).unwrap();
                    }
                }
                Op::Gc => {
                    db.gc();
                }
            }
            prop_assert_eq!(db.current_version(), model.version);
        }

        // Every still-open snapshot reads what the model says
        for open in slots.iter().flatten() {
            for k in 0..KEYS {
                let name = key_name(k);
                if !open.writes.contains_key(&name) {
                    prop_assert_eq!(db.read(open.id, &name).unwrap(), model.read_at(&name, open.snapshot));
                }
            }
        }
    }

    #[test]
    fn prop_gc_never_changes_visible_values(
        values in prop::collection::vec((0..KEYS, any::<Option<i64>>()), 1..40),
        pin_at in 0usize..40,
    ) {
        let db: SnapKv<String, i64> = SnapKv::new();
        let mut pinned = None;

        for (i, (k, v)) in values.iter().enumerate() {
            if i == pin_at {
                pinned = Some(db.begin_transaction());
            }
            let t = db.begin_transaction();
            match v {
                Some(v) => db.write(t, key_name(*k), *v).unwrap(),
                None => db.delete(t, key_name(*k)).unwrap(),
            }
            prop_assert!(db.commit(t).unwrap().is_committed());
        }
        let pinned = pinned.unwrap_or_else(|| db.begin_transaction());

        let before: Vec<_> = (0..KEYS)
            .map(|k| db.read(pinned, &key_name(k)).unwrap())
            .collect();
        db.gc();
        let after: Vec<_> = (0..KEYS)
            .map(|k| db.read(pinned, &key_name(k)).unwrap())
            .collect();
        prop_assert_eq!(before, after);
    }
}
