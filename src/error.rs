//! Unified error types for snapkv.
//!
//! This module provides the public error type that wraps internal errors
//! and presents a consistent interface to users.

use snapkv_core::{AbortReason, TransactionStatus, TxnId};
use thiserror::Error;

/// All snapkv errors.
///
/// Commit conflicts only appear here when they come out of the closure
/// helpers ([`SnapKv::transaction`](crate::SnapKv::transaction) and
/// friends); the explicit `commit` call reports them as
/// [`CommitOutcome::Aborted`](crate::CommitOutcome::Aborted).
#[derive(Debug, Error)]
pub enum Error {
    /// Transaction id was never issued or is already finalized
    #[error("transaction not found: {0}")]
    TransactionNotFound(TxnId),

    /// Transaction is not in a state that allows the operation
    #[error("transaction {txn_id} is {status}")]
    InvalidState {
        /// Offending id
        txn_id: TxnId,
        /// Status observed
        status: TransactionStatus,
    },

    /// Commit lost a write-write conflict
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transaction was aborted by the idle reaper
    #[error("transaction {0} aborted after idle timeout")]
    Timeout(TxnId),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error (spawning the maintenance thread)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for snapkv operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Retryable errors may succeed when the whole transaction is re-run
    /// against a fresh snapshot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Timeout(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::TransactionNotFound(_))
    }

    /// Check if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}

// Convert from internal core errors
impl From<snapkv_core::Error> for Error {
    fn from(e: snapkv_core::Error) -> Self {
        use snapkv_core::Error as CoreError;
        match e {
            CoreError::TransactionNotFound { txn_id } => Error::TransactionNotFound(txn_id),
            CoreError::InvalidState {
                txn_id,
                status: TransactionStatus::Aborted(AbortReason::IdleTimeout),
            } => Error::Timeout(txn_id),
            CoreError::InvalidState { txn_id, status } => Error::InvalidState { txn_id, status },
            CoreError::InvariantViolation(msg) => Error::Internal(msg),
        }
    }
}
