//! Transaction records and commit outcomes
//!
//! A transaction is a snapshot version plus a private write buffer. Nothing
//! in the buffer is visible to other transactions until the commit
//! coordinator publishes it.

use rustc_hash::FxHashMap;
use serde::Serialize;
use snapkv_core::{TransactionStatus, TxnId, Version};
use std::time::{Duration, Instant};

/// Buffered writes of one transaction
///
/// `None` is a buffered delete. Later writes to the same key overwrite
/// earlier ones (last write wins within a transaction).
pub type WriteBuffer<K, V> = FxHashMap<K, Option<V>>;

/// Registry-owned state of one transaction
#[derive(Debug)]
pub(crate) struct TransactionState<K, V> {
    pub(crate) snapshot: Version,
    pub(crate) writes: WriteBuffer<K, V>,
    pub(crate) status: TransactionStatus,
    pub(crate) started_at: Instant,
    pub(crate) last_activity: Instant,
}

impl<K, V> TransactionState<K, V> {
    pub(crate) fn new(snapshot: Version) -> Self {
        let now = Instant::now();
        TransactionState {
            snapshot,
            writes: WriteBuffer::default(),
            status: TransactionStatus::Active,
            started_at: now,
            last_activity: now,
        }
    }

    #[inline]
    pub(crate) fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Whether this transaction still pins its snapshot for GC
    #[inline]
    pub(crate) fn holds_snapshot(&self) -> bool {
        matches!(
            self.status,
            TransactionStatus::Active | TransactionStatus::Committing
        )
    }
}

/// Point-in-time view of a transaction, returned by lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    /// Transaction id
    pub id: TxnId,
    /// Version the transaction reads at
    pub snapshot: Version,
    /// Current lifecycle status
    pub status: TransactionStatus,
    /// Number of distinct keys in the write buffer
    pub pending_writes: usize,
    /// Time since begin
    pub age: Duration,
    /// Time since the last read or write
    pub idle: Duration,
}

/// Result of a snapshot-or-buffer lookup inside the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BufferedRead<V> {
    /// Key is in the write buffer; `None` means a buffered delete
    Buffered(Option<V>),
    /// Key is not buffered; read the store at this snapshot
    Unbuffered(Version),
}

/// What a transaction left behind when it was removed from the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTransaction {
    /// Transaction id
    pub id: TxnId,
    /// Snapshot it read at
    pub snapshot: Version,
    /// Terminal status it was finalized with
    pub outcome: TransactionStatus,
    /// Wall time between begin and finalize
    pub duration: Duration,
}

/// Outcome of a commit attempt
///
/// Conflicts are an expected result of optimistic concurrency, so they are
/// returned here rather than as an error. The caller decides whether to
/// re-run the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome<K> {
    /// Writes were published at `version`
    Committed {
        /// Version assigned to every key in the write buffer
        version: Version,
    },
    /// Nothing was buffered; no version was consumed
    ReadOnly {
        /// Snapshot the transaction read at
        snapshot: Version,
    },
    /// A written key gained a newer committed version after the snapshot
    Aborted {
        /// Every buffered key whose latest version exceeds the snapshot
        conflicts: Vec<K>,
    },
}

impl<K> CommitOutcome<K> {
    /// Whether the transaction committed (with or without writes)
    pub fn is_committed(&self) -> bool {
        !self.is_aborted()
    }

    /// Whether the transaction lost a write-write conflict
    pub fn is_aborted(&self) -> bool {
        matches!(self, CommitOutcome::Aborted { .. })
    }

    /// Version consumed by this commit, if any
    pub fn version(&self) -> Option<Version> {
        match self {
            CommitOutcome::Committed { version } => Some(*version),
            _ => None,
        }
    }
}
