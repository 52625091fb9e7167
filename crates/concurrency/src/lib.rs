//! Concurrency layer for snapkv
//!
//! This crate implements snapshot isolation with optimistic concurrency
//! control:
//! - TransactionRegistry: id allocation and per-transaction write buffers
//! - TransactionManager: begin / read / write / delete / rollback
//! - CommitCoordinator: first-committer-wins validation and atomic publish
//! - Minimum-active-snapshot garbage collection and idle-transaction reaping

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod commit;
pub mod manager;
pub mod metrics;
pub mod registry;
pub mod transaction;

pub use commit::CommitCoordinator;
pub use manager::TransactionManager;
pub use metrics::{MetricsSnapshot, TransactionMetrics};
pub use registry::TransactionRegistry;
pub use transaction::{CommitOutcome, FinalizedTransaction, TransactionInfo, WriteBuffer};
