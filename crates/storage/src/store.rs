//! Multi-version store
//!
//! Replaces a single value per key with an append-only [`VersionChain`]
//! per key, sharded through DashMap.
//!
//! # Design
//!
//! - DashMap: 16-way sharded by default, reads only take a shard read lock
//! - FxHash: fast non-crypto hash for the key index
//! - Per-key chains: binary-search snapshot reads, O(log n) per key
//!
//! # Mutation
//!
//! Only two paths mutate chains: [`VersionStore::append`], called by the
//! commit coordinator under its commit lock, and the GC methods. Readers
//! never write.

use crate::chain::VersionChain;
use dashmap::DashMap;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use snapkv_core::{Result, Version};
use std::hash::{BuildHasherDefault, Hash};

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Outcome of a garbage-collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcStats {
    /// Boundary the pass pruned against
    pub safe_version: Version,
    /// Number of chains visited
    pub keys_scanned: usize,
    /// Number of superseded entries dropped
    pub versions_removed: usize,
    /// Number of keys dropped entirely (deleted keys nobody can see)
    pub keys_removed: usize,
}

impl GcStats {
    /// Whether the pass reclaimed anything
    pub fn is_noop(&self) -> bool {
        self.versions_removed == 0 && self.keys_removed == 0
    }
}

/// Versioned key-value store
///
/// # Thread Safety
///
/// All operations are thread-safe:
/// - `snapshot_read()` / `latest_version()`: shard read lock only
/// - `append()`: locks the target key's shard
/// - `gc()`: visits shards one at a time, never holds two at once
///
/// # Example
///
/// ```
/// use snapkv_storage::VersionStore;
///
/// let store: VersionStore<String, i64> = VersionStore::new();
/// store.append("x".to_string(), 1, Some(10)).unwrap();
/// store.append("x".to_string(), 3, Some(30)).unwrap();
///
/// assert_eq!(store.snapshot_read(&"x".to_string(), 0), None);
/// assert_eq!(store.snapshot_read(&"x".to_string(), 2), Some(10));
/// assert_eq!(store.latest_version(&"x".to_string()), Some(3));
/// ```
pub struct VersionStore<K, V> {
    chains: DashMap<K, VersionChain<V>, FxBuildHasher>,
}

impl<K, V> VersionStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            chains: DashMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Create with room for `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            chains: DashMap::with_capacity_and_hasher(capacity, FxBuildHasher::default()),
        }
    }

    /// Append a committed entry for `key`
    ///
    /// `value == None` records a delete.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` if `version` is not strictly greater than every
    /// version already appended for `key`.
    pub fn append(&self, key: K, version: Version, value: Option<V>) -> Result<()> {
        self.chains.entry(key).or_default().push(version, value)
    }

    /// Value visible at `as_of_version`
    ///
    /// Returns `None` if the key was never written, was only written after
    /// `as_of_version`, or the visible entry is a tombstone.
    #[inline]
    pub fn snapshot_read(&self, key: &K, as_of_version: Version) -> Option<V> {
        self.chains
            .get(key)
            .and_then(|chain| chain.read_at(as_of_version).and_then(|e| e.value.clone()))
    }

    /// Version of the newest entry for `key`
    #[inline]
    pub fn latest_version(&self, key: &K) -> Option<Version> {
        self.chains.get(key).and_then(|chain| chain.latest_version())
    }

    /// Prune one key's chain against `safe_version`
    ///
    /// Returns the number of entries removed. The key itself is dropped if
    /// only an invisible tombstone remains.
    pub fn gc_below(&self, key: &K, safe_version: Version) -> usize {
        let removed = self
            .chains
            .get_mut(key)
            .map(|mut chain| chain.prune_below(safe_version))
            .unwrap_or(0);
        if self
            .chains
            .remove_if(key, |_, chain| chain.is_reclaimable(safe_version))
            .is_some()
        {
            return removed + 1;
        }
        removed
    }

    /// Prune every chain against `safe_version`
    ///
    /// `safe_version` must not exceed the oldest snapshot any live
    /// transaction can still read at.
    pub fn gc(&self, safe_version: Version) -> GcStats {
        let mut stats = GcStats {
            safe_version,
            ..GcStats::default()
        };
        let mut reclaimable = Vec::new();

        for mut entry in self.chains.iter_mut() {
            stats.keys_scanned += 1;
            stats.versions_removed += entry.value_mut().prune_below(safe_version);
            if entry.value().is_reclaimable(safe_version) {
                reclaimable.push(entry.key().clone());
            }
        }

        // Re-checked under the shard lock: a commit may have appended since
        for key in reclaimable {
            if self
                .chains
                .remove_if(&key, |_, chain| chain.is_reclaimable(safe_version))
                .is_some()
            {
                stats.keys_removed += 1;
            }
        }

        if !stats.is_noop() {
            tracing::debug!(
                safe_version,
                versions_removed = stats.versions_removed,
                keys_removed = stats.keys_removed,
                "Pruned version chains"
            );
        }
        stats
    }

    /// All retained entries for `key`, oldest first
    pub fn history(&self, key: &K) -> Vec<(Version, Option<V>)> {
        self.chains
            .get(key)
            .map(|chain| {
                chain
                    .entries()
                    .iter()
                    .map(|e| (e.version, e.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether any entry exists for `key`
    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.chains.contains_key(key)
    }

    /// Number of keys with at least one retained entry
    pub fn key_count(&self) -> usize {
        self.chains.len()
    }

    /// Total retained entries across all keys
    pub fn version_count(&self) -> usize {
        self.chains.iter().map(|entry| entry.value().len()).sum()
    }
}

impl<K, V> Default for VersionStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for VersionStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore")
            .field("key_count", &self.key_count())
            .field("version_count", &self.version_count())
            .finish()
    }
}
