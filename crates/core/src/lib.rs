//! Core types for snapkv
//!
//! This crate defines the vocabulary shared by the storage and concurrency
//! layers:
//! - [`TxnId`]: Unique, never-reused transaction identifier
//! - [`Version`]: Commit version drawn from the global version counter
//! - [`TransactionStatus`] / [`AbortReason`]: Transaction lifecycle states
//! - [`Error`]: Caller-misuse and invariant errors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{AbortReason, TransactionStatus, TxnId, Version};
