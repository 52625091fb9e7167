//! Core types for the transactional store
//!
//! This module defines the fundamental types used throughout the system:
//! - [`TxnId`]: Unique identifier for a transaction
//! - [`Version`]: Commit version assigned by the global version counter
//! - [`TransactionStatus`]: Where a transaction is in its lifecycle

use serde::{Deserialize, Serialize};

/// Commit version
///
/// Version 0 is the empty database: no key has an entry at version 0.
/// Each commit that writes at least one key consumes exactly one version.
pub type Version = u64;

/// Unique identifier for a transaction
///
/// Ids are allocated from a per-store counter and are never reused within
/// the lifetime of that store.
///
/// # Examples
///
/// ```
/// use snapkv_core::TxnId;
///
/// let id = TxnId::new(7);
/// assert_eq!(id.as_u64(), 7);
/// assert_eq!(id.to_string(), "txn-7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxnId(u64);

impl TxnId {
    /// Wrap a raw id
    pub const fn new(raw: u64) -> Self {
        TxnId(raw)
    }

    /// Raw numeric value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Why a transaction ended up aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// Caller rolled the transaction back
    Rollback,
    /// Commit found a key with a committed version newer than the snapshot
    Conflict,
    /// Transaction sat idle past the configured timeout and was reaped
    IdleTimeout,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::Rollback => write!(f, "rollback"),
            AbortReason::Conflict => write!(f, "write-write conflict"),
            AbortReason::IdleTimeout => write!(f, "idle timeout"),
        }
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Committing` (commit started)
/// - `Committing` → `Committed` (no conflict, writes published)
/// - `Committing` → `Aborted` (conflict detected)
/// - `Active` → `Aborted` (rollback or idle timeout)
///
/// Terminal states (no transitions allowed):
/// - `Committed`
/// - `Aborted`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// A commit for this transaction is in progress
    Committing,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted(AbortReason),
}

impl TransactionStatus {
    /// Whether reads and writes are allowed
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionStatus::Active)
    }

    /// Whether no further transition is possible
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Committed | TransactionStatus::Aborted(_)
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "active"),
            TransactionStatus::Committing => write!(f, "committing"),
            TransactionStatus::Committed => write!(f, "committed"),
            TransactionStatus::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}
