//! Transaction manager
//!
//! Entry point for the transaction lifecycle:
//! - `begin_transaction()` takes a snapshot of the global version counter
//! - `read()` serves the write buffer first, then the store at the snapshot
//! - `write()` / `delete()` only touch the private write buffer
//! - `commit()` hands off to the [`CommitCoordinator`]
//! - `rollback()` discards the registry record
//!
//! ## Snapshot registration vs. GC
//!
//! `begin_transaction()` reads the counter and registers the snapshot under
//! the read side of a gate; `gc()` computes its boundary under the write
//! side. A snapshot older than a computed boundary can therefore never
//! appear after GC has started pruning against it.

use crate::commit::CommitCoordinator;
use crate::metrics::TransactionMetrics;
use crate::registry::TransactionRegistry;
use crate::transaction::{BufferedRead, CommitOutcome, TransactionInfo};
use parking_lot::RwLock;
use snapkv_core::{AbortReason, Result, TransactionStatus, TxnId, Version};
use snapkv_storage::{GcStats, VersionStore};
use std::hash::Hash;
use std::time::Duration;

/// Manages transaction lifecycle over a shared [`VersionStore`]
///
/// Each instance is an independent store: no state is global, so any
/// number of managers can coexist in one process.
///
/// # Example
///
/// ```
/// use snapkv_concurrency::{CommitOutcome, TransactionManager};
///
/// let mgr: TransactionManager<String, i64> = TransactionManager::new();
/// let t1 = mgr.begin_transaction();
/// mgr.write(t1, "x".to_string(), 1).unwrap();
/// assert_eq!(mgr.commit(t1).unwrap(), CommitOutcome::Committed { version: 1 });
///
/// let t2 = mgr.begin_transaction();
/// assert_eq!(mgr.read(t2, &"x".to_string()).unwrap(), Some(1));
/// ```
pub struct TransactionManager<K, V> {
    store: VersionStore<K, V>,
    registry: TransactionRegistry<K, V>,
    coordinator: CommitCoordinator,
    metrics: TransactionMetrics,
    begin_gate: RwLock<()>,
}

impl<K, V> TransactionManager<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty store at version 0
    pub fn new() -> Self {
        Self::with_store(VersionStore::new())
    }

    /// Create over a pre-sized store
    pub fn with_capacity(keys: usize) -> Self {
        Self::with_store(VersionStore::with_capacity(keys))
    }

    fn with_store(store: VersionStore<K, V>) -> Self {
        TransactionManager {
            store,
            registry: TransactionRegistry::new(),
            coordinator: CommitCoordinator::default(),
            metrics: TransactionMetrics::new(),
            begin_gate: RwLock::new(()),
        }
    }

    /// Begin a transaction reading at the current version
    pub fn begin_transaction(&self) -> TxnId {
        let _gate = self.begin_gate.read();
        let snapshot = self.coordinator.current_version();
        let id = self.registry.begin(snapshot);
        self.metrics.record_begin();
        tracing::debug!(txn_id = %id, snapshot, "Transaction begun");
        id
    }

    /// Read `key` as seen by transaction `id`
    ///
    /// Own buffered writes win (read-your-writes); otherwise the newest
    /// entry at or below the snapshot is returned.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` or `InvalidState` if `id` is not Active.
    pub fn read(&self, id: TxnId, key: &K) -> Result<Option<V>> {
        match self.registry.buffered_read(id, key)? {
            BufferedRead::Buffered(value) => Ok(value),
            BufferedRead::Unbuffered(snapshot) => {
                let value = self.store.snapshot_read(key, snapshot);
                // A reap between lookup and read releases the snapshot to GC
                self.registry.ensure_active(id)?;
                Ok(value)
            }
        }
    }

    /// Buffer a write; invisible to everyone else until commit
    pub fn write(&self, id: TxnId, key: K, value: V) -> Result<()> {
        self.registry.buffer_write(id, key, Some(value))
    }

    /// Buffer a delete; committed as a tombstone
    pub fn delete(&self, id: TxnId, key: K) -> Result<()> {
        self.registry.buffer_write(id, key, None)
    }

    /// Commit transaction `id`
    ///
    /// See [`CommitCoordinator::commit`].
    pub fn commit(&self, id: TxnId) -> Result<CommitOutcome<K>> {
        let outcome = self.coordinator.commit(id, &self.registry, &self.store)?;
        match &outcome {
            CommitOutcome::Committed { .. } => self.metrics.record_commit(),
            CommitOutcome::ReadOnly { .. } => self.metrics.record_read_only(),
            CommitOutcome::Aborted { .. } => self.metrics.record_conflict(),
        }
        Ok(outcome)
    }

    /// Discard transaction `id` and its buffered writes
    ///
    /// Never touches the store. Succeeds on a transaction the idle reaper
    /// already aborted.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` if already finalized, `InvalidState` while a
    /// commit for it is in progress.
    pub fn rollback(&self, id: TxnId) -> Result<()> {
        let done = self
            .registry
            .finalize(id, TransactionStatus::Aborted(AbortReason::Rollback))?;
        self.metrics.record_rollback();
        tracing::debug!(txn_id = %id, snapshot = done.snapshot, "Rolled back");
        Ok(())
    }

    /// Snapshot the GC may prune against without harming a live reader
    ///
    /// Minimum Active snapshot, or the current version if none.
    pub fn safe_version(&self) -> Version {
        let _gate = self.begin_gate.write();
        self.registry
            .min_active_snapshot()
            .unwrap_or_else(|| self.coordinator.current_version())
    }

    /// Prune every version chain against [`safe_version`](Self::safe_version)
    pub fn gc(&self) -> GcStats {
        let safe_version = self.safe_version();
        let stats = self.store.gc(safe_version);
        self.metrics
            .record_gc(stats.versions_removed + stats.keys_removed);
        if !stats.is_noop() {
            tracing::info!(
                safe_version,
                keys_scanned = stats.keys_scanned,
                versions_removed = stats.versions_removed,
                keys_removed = stats.keys_removed,
                "GC pass complete"
            );
        }
        stats
    }

    /// Force-abort transactions idle longer than `timeout`
    ///
    /// Their owners get `InvalidState` on the next read, write or commit.
    pub fn reap_idle(&self, timeout: Duration) -> Vec<TxnId> {
        let reaped = self.registry.reap_idle(timeout);
        if !reaped.is_empty() {
            self.metrics.record_reaped(reaped.len());
            for id in &reaped {
                tracing::warn!(txn_id = %id, ?timeout, "Aborted idle transaction");
            }
        }
        reaped
    }

    /// Lifecycle details of transaction `id`
    pub fn transaction_info(&self, id: TxnId) -> Result<TransactionInfo> {
        self.registry.get(id)
    }

    /// Latest published commit version
    pub fn current_version(&self) -> Version {
        self.coordinator.current_version()
    }

    /// Number of Active or Committing transactions
    pub fn active_transactions(&self) -> usize {
        self.registry.active_count()
    }

    /// Oldest snapshot pinned by a live transaction
    pub fn min_active_snapshot(&self) -> Option<Version> {
        self.registry.min_active_snapshot()
    }

    /// Underlying version store
    pub fn store(&self) -> &VersionStore<K, V> {
        &self.store
    }

    /// Transaction counters
    pub fn metrics(&self) -> &TransactionMetrics {
        &self.metrics
    }
}

impl<K, V> Default for TransactionManager<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for TransactionManager<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("version", &self.current_version())
            .field("active_transactions", &self.active_transactions())
            .field("store", &self.store)
            .finish()
    }
}
