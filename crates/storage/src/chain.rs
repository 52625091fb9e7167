//! Per-key version chain
//!
//! A chain is an append-only log of `(version, value)` entries kept in
//! strictly ascending version order. Reads at a snapshot are a binary
//! search over the log; nothing is ever updated in place. Entries only
//! leave the chain through [`VersionChain::prune_below`].

use snapkv_core::{Error, Result, Version};

/// One committed entry in a version chain
///
/// `value == None` is a tombstone: the key was deleted at `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry<V> {
    /// Commit version that produced this entry
    pub version: Version,
    /// Committed value, or `None` for a delete
    pub value: Option<V>,
}

impl<V> VersionEntry<V> {
    /// Whether this entry records a delete
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

/// Ordered history of committed values for one key
#[derive(Debug, Clone)]
pub struct VersionChain<V> {
    entries: Vec<VersionEntry<V>>,
}

impl<V> VersionChain<V> {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of retained entries
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain holds no entries
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All retained entries, oldest first
    #[inline]
    pub fn entries(&self) -> &[VersionEntry<V>] {
        &self.entries
    }

    /// Version of the newest entry
    #[inline]
    pub fn latest_version(&self) -> Option<Version> {
        self.entries.last().map(|e| e.version)
    }

    /// Append an entry
    ///
    /// # Errors
    ///
    /// `InvariantViolation` if `version` is not strictly greater than the
    /// newest version already in the chain.
    pub fn push(&mut self, version: Version, value: Option<V>) -> Result<()> {
        if let Some(latest) = self.latest_version() {
            if version <= latest {
                return Err(Error::InvariantViolation(format!(
                    "non-increasing append: version {} after {}",
                    version, latest
                )));
            }
        }
        self.entries.push(VersionEntry { version, value });
        Ok(())
    }

    /// Entry visible at `as_of`: the greatest version `<= as_of`
    ///
    /// O(log n) in the number of retained entries.
    pub fn read_at(&self, as_of: Version) -> Option<&VersionEntry<V>> {
        let idx = self.entries.partition_point(|e| e.version <= as_of);
        idx.checked_sub(1).map(|i| &self.entries[i])
    }

    /// Drop entries strictly older than the newest entry with
    /// `version <= safe_version`
    ///
    /// The entry visible at `safe_version` is kept, so every snapshot at or
    /// above `safe_version` still reads the same value. Returns the number
    /// of entries removed.
    pub fn prune_below(&mut self, safe_version: Version) -> usize {
        let visible = self.entries.partition_point(|e| e.version <= safe_version);
        if visible <= 1 {
            return 0;
        }
        let removed = visible - 1;
        self.entries.drain(..removed);
        removed
    }

    /// Whether the whole chain can be dropped at `safe_version`
    ///
    /// True when the only remaining entry is a tombstone no live snapshot
    /// can see past.
    pub fn is_reclaimable(&self, safe_version: Version) -> bool {
        match self.entries.as_slice() {
            [only] => only.is_tombstone() && only.version <= safe_version,
            _ => false,
        }
    }
}

impl<V> Default for VersionChain<V> {
    fn default() -> Self {
        Self::new()
    }
}
