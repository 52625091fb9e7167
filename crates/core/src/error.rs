//! Error types for the transactional store
//!
//! Write-write conflicts are deliberately absent: they are an expected
//! outcome of commit and are reported as a value, not as an error.

use crate::types::{TransactionStatus, TxnId};
use thiserror::Error;

/// Errors raised by the storage and concurrency layers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The id was never issued or its transaction was already finalized
    #[error("transaction not found: {txn_id}")]
    TransactionNotFound {
        /// Offending id
        txn_id: TxnId,
    },

    /// The transaction exists but cannot accept this operation
    #[error("transaction {txn_id} is {status}")]
    InvalidState {
        /// Offending id
        txn_id: TxnId,
        /// Status observed when the operation was attempted
        status: TransactionStatus,
    },

    /// Internal consistency failure, such as a non-increasing append
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Caller referenced an unknown or finalized transaction
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::TransactionNotFound { .. })
    }

    /// Caller operated on a transaction that is not active
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState { .. })
    }

    /// Implementation bug; never retried
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Error::InvariantViolation(_))
    }
}
