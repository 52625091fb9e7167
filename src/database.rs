//! Main entry point for snapkv.
//!
//! This module provides the `SnapKv` struct, the primary entry point for
//! all store operations, and `SnapKvBuilder` for configuring it.

use crate::config::{Config, GcPolicy, RetryConfig};
use crate::error::{Error, Result};
use crate::maintenance::MaintenanceWorker;
use parking_lot::Mutex;
use snapkv_concurrency::{CommitOutcome, MetricsSnapshot, TransactionInfo, TransactionManager};
use snapkv_core::{TxnId, Version};
use snapkv_storage::GcStats;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory multi-version key-value store with snapshot isolation.
///
/// Two ways to run transactions:
///
/// 1. **Explicit** - `begin_transaction`, `read`, `write`, `commit` /
///    `rollback` on a [`TxnId`]. A conflict comes back as
///    [`CommitOutcome::Aborted`].
/// 2. **Closure** - [`transaction`](Self::transaction) commits on `Ok` and
///    rolls back on `Err`; a conflict becomes [`Error::Conflict`].
///
/// # Example
///
/// ```
/// use snapkv::prelude::*;
///
/// let db: SnapKv<String, i64> = SnapKv::new();
///
/// db.transaction(|txn| {
///     txn.put("balance".to_string(), 100)?;
///     Ok(())
/// })
/// .unwrap();
///
/// let t = db.begin_transaction();
/// assert_eq!(db.read(t, &"balance".to_string()).unwrap(), Some(100));
/// db.rollback(t).unwrap();
/// ```
pub struct SnapKv<K, V> {
    manager: Arc<TransactionManager<K, V>>,
    config: Config,
    commits_since_gc: AtomicU64,
    maintenance: Mutex<Option<MaintenanceWorker>>,
}

impl<K, V> SnapKv<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a store with default settings.
    ///
    /// Manual GC, no idle timeout, no background thread.
    pub fn new() -> Self {
        SnapKv {
            manager: Arc::new(TransactionManager::new()),
            config: Config::default(),
            commits_since_gc: AtomicU64::new(0),
            maintenance: Mutex::new(None),
        }
    }

    /// Create a store from a [`Config`].
    ///
    /// Starts the maintenance thread when `maintenance_interval_ms` is set.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;

        let manager = Arc::new(if config.initial_capacity > 0 {
            TransactionManager::with_capacity(config.initial_capacity)
        } else {
            TransactionManager::new()
        });

        let maintenance = match config.maintenance_interval() {
            Some(interval) => Some(MaintenanceWorker::spawn(
                Arc::clone(&manager),
                interval,
                config.idle_timeout(),
            )?),
            None => None,
        };

        tracing::debug!(?config, "Store opened");
        Ok(SnapKv {
            manager,
            config,
            commits_since_gc: AtomicU64::new(0),
            maintenance: Mutex::new(maintenance),
        })
    }

    // ========================================================================
    // Explicit transaction API
    // ========================================================================

    /// Begin a transaction at the current version.
    pub fn begin_transaction(&self) -> TxnId {
        self.manager.begin_transaction()
    }

    /// Read `key` as seen by transaction `id`.
    pub fn read(&self, id: TxnId, key: &K) -> Result<Option<V>> {
        Ok(self.manager.read(id, key)?)
    }

    /// Buffer a write in transaction `id`.
    pub fn write(&self, id: TxnId, key: K, value: V) -> Result<()> {
        Ok(self.manager.write(id, key, value)?)
    }

    /// Buffer a delete in transaction `id`.
    pub fn delete(&self, id: TxnId, key: K) -> Result<()> {
        Ok(self.manager.delete(id, key)?)
    }

    /// Commit transaction `id`.
    ///
    /// Runs a GC pass afterwards when the [`GcPolicy`] threshold is reached.
    ///
    /// # Returns
    /// * `Ok(Committed { version })` - writes published
    /// * `Ok(ReadOnly { .. })` - nothing to publish, no version consumed
    /// * `Ok(Aborted { conflicts })` - first-committer-wins conflict; re-run
    ///   the transaction against a fresh `begin_transaction`
    pub fn commit(&self, id: TxnId) -> Result<CommitOutcome<K>> {
        let outcome = self.manager.commit(id)?;
        if let (CommitOutcome::Committed { .. }, GcPolicy::EveryCommits { commits }) =
            (&outcome, self.config.gc)
        {
            if self.gc_due(commits) {
                self.manager.gc();
            }
        }
        Ok(outcome)
    }

    /// Count one commit; true for exactly one caller per `commits` window
    fn gc_due(&self, commits: u64) -> bool {
        let previous = match self.commits_since_gc.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |since| Some(if since + 1 >= commits { 0 } else { since + 1 }),
        ) {
            Ok(previous) | Err(previous) => previous,
        };
        previous + 1 >= commits
    }

    /// Roll back transaction `id`, discarding its writes.
    pub fn rollback(&self, id: TxnId) -> Result<()> {
        Ok(self.manager.rollback(id)?)
    }

    // ========================================================================
    // Closure transaction API
    // ========================================================================

    /// Execute a transaction with automatic commit or rollback.
    ///
    /// Commits if the closure returns `Ok`, rolls back if it returns `Err`.
    ///
    /// # Errors
    ///
    /// The closure's error, or `Error::Conflict` if the commit aborted.
    ///
    /// # Example
    /// ```
    /// use snapkv::SnapKv;
    ///
    /// let db: SnapKv<&'static str, i64> = SnapKv::new();
    /// let previous = db.transaction(|txn| {
    ///     let val = txn.get(&"counter")?;
    ///     txn.put("counter", val.unwrap_or(0) + 1)?;
    ///     Ok(val)
    /// }).unwrap();
    /// assert_eq!(previous, None);
    /// ```
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Txn<'_, K, V>) -> Result<T>,
    {
        self.transaction_with_version(f).map(|(value, _)| value)
    }

    /// Like [`transaction`](Self::transaction), also returning the commit
    /// version (`None` when nothing was written).
    pub fn transaction_with_version<F, T>(&self, f: F) -> Result<(T, Option<Version>)>
    where
        F: FnOnce(&mut Txn<'_, K, V>) -> Result<T>,
    {
        let id = self.begin_transaction();
        let mut txn = Txn { db: self, id };

        match f(&mut txn) {
            Ok(value) => match self.commit(id)? {
                CommitOutcome::Committed { version } => Ok((value, Some(version))),
                CommitOutcome::ReadOnly { .. } => Ok((value, None)),
                CommitOutcome::Aborted { conflicts } => Err(Error::Conflict(format!(
                    "{} aborted: {} key(s) modified since snapshot",
                    id,
                    conflicts.len()
                ))),
            },
            Err(e) => {
                // Already finalized if the closure itself committed or rolled back
                let _ = self.rollback(id);
                Err(e)
            }
        }
    }

    /// Execute a transaction, re-running it on conflict with the configured
    /// [`RetryConfig`].
    pub fn transaction_with_retry<F, T>(&self, f: F) -> Result<T>
    where
        F: Fn(&mut Txn<'_, K, V>) -> Result<T>,
    {
        let retry = self.config.retry.clone();
        self.transaction_with_retry_config(&retry, f)
    }

    /// Execute a transaction with automatic retry on conflict.
    ///
    /// The closure is called repeatedly until either:
    /// - The transaction commits successfully
    /// - A non-retryable error occurs (not retried)
    /// - Maximum retries are exceeded
    pub fn transaction_with_retry_config<F, T>(&self, config: &RetryConfig, f: F) -> Result<T>
    where
        F: Fn(&mut Txn<'_, K, V>) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            match self.transaction(&f) {
                Err(e) if e.is_retryable() && attempt < config.max_retries => {
                    tracing::debug!(attempt, error = %e, "Retrying transaction");
                    std::thread::sleep(config.calculate_delay(attempt));
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Prune versions no live snapshot can observe.
    pub fn gc(&self) -> GcStats {
        self.manager.gc()
    }

    /// Reap transactions idle past the configured timeout.
    ///
    /// No-op without an `idle_timeout`.
    pub fn reap_idle(&self) -> Vec<TxnId> {
        match self.config.idle_timeout() {
            Some(timeout) => self.manager.reap_idle(timeout),
            None => Vec::new(),
        }
    }

    /// Reap transactions idle longer than `timeout`.
    pub fn reap_idle_after(&self, timeout: Duration) -> Vec<TxnId> {
        self.manager.reap_idle(timeout)
    }

    /// Stop the maintenance thread, if any.
    ///
    /// The store remains usable; GC and reaping become manual.
    pub fn shutdown(&self) {
        if let Some(mut worker) = self.maintenance.lock().take() {
            worker.stop();
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Latest published commit version.
    pub fn current_version(&self) -> Version {
        self.manager.current_version()
    }

    /// Number of Active or Committing transactions.
    pub fn active_transactions(&self) -> usize {
        self.manager.active_transactions()
    }

    /// Oldest snapshot pinned by a live transaction.
    pub fn min_active_snapshot(&self) -> Option<Version> {
        self.manager.min_active_snapshot()
    }

    /// Lifecycle details of transaction `id`.
    pub fn transaction_info(&self, id: TxnId) -> Result<TransactionInfo> {
        Ok(self.manager.transaction_info(id)?)
    }

    /// Number of keys with retained history.
    pub fn key_count(&self) -> usize {
        self.manager.store().key_count()
    }

    /// Total retained versions across all keys.
    pub fn version_count(&self) -> usize {
        self.manager.store().version_count()
    }

    /// Retained `(version, value)` history for `key`, oldest first.
    ///
    /// `None` values are deletes.
    pub fn history(&self, key: &K) -> Vec<(Version, Option<V>)> {
        self.manager.store().history(key)
    }

    /// Transaction counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.manager.metrics().snapshot()
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl<K, V> Default for SnapKv<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for SnapKv<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapKv")
            .field("manager", &self.manager)
            .field("config", &self.config)
            .finish()
    }
}

/// Transaction handle passed to closure transactions.
///
/// Borrowed from the store for the duration of the closure. The closure
/// helpers own commit and rollback.
pub struct Txn<'a, K, V> {
    db: &'a SnapKv<K, V>,
    id: TxnId,
}

impl<'a, K, V> Txn<'a, K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Transaction id
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Version this transaction reads at
    pub fn snapshot(&self) -> Result<Version> {
        Ok(self.db.transaction_info(self.id)?.snapshot)
    }

    /// Read `key` (own writes first, then the snapshot)
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.db.read(self.id, key)
    }

    /// Buffer a write
    pub fn put(&mut self, key: K, value: V) -> Result<()> {
        self.db.write(self.id, key, value)
    }

    /// Buffer a delete
    pub fn delete(&mut self, key: K) -> Result<()> {
        self.db.delete(self.id, key)
    }
}

/// Builder for [`SnapKv`] configuration.
///
/// # Example
///
/// ```
/// use snapkv::{SnapKv, SnapKvBuilder};
/// use std::time::Duration;
///
/// let db: SnapKv<String, String> = SnapKvBuilder::new()
///     .gc_every(64)
///     .idle_timeout(Duration::from_secs(30))
///     .build()
///     .unwrap();
/// assert_eq!(db.config().idle_timeout_ms, Some(30_000));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SnapKvBuilder {
    config: Config,
}

impl SnapKvBuilder {
    /// Start from default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the GC trigger
    pub fn gc_policy(mut self, policy: GcPolicy) -> Self {
        self.config.gc = policy;
        self
    }

    /// Run GC after every `commits` version-consuming commits
    pub fn gc_every(self, commits: u64) -> Self {
        self.gc_policy(GcPolicy::EveryCommits { commits })
    }

    /// Force-abort transactions idle longer than `timeout`
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Run reaping and GC on a background thread every `interval`
    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.config.maintenance_interval_ms = Some(duration_ms(interval));
        self
    }

    /// Retry policy for `transaction_with_retry`
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Pre-size the store for `keys` keys
    pub fn capacity(mut self, keys: usize) -> Self {
        self.config.initial_capacity = keys;
        self
    }

    /// Current configuration
    pub fn get_config(&self) -> &Config {
        &self.config
    }

    /// Validate the configuration and create the store
    pub fn build<K, V>(self) -> Result<SnapKv<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        SnapKv::with_config(self.config)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
