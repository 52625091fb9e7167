//! # snapkv
//!
//! In-memory multi-version key-value store with snapshot-isolated
//! transactions.
//!
//! Every key keeps an append-only chain of committed versions. A
//! transaction reads the newest version at or below the snapshot it took
//! at begin, buffers its own writes privately, and publishes them
//! atomically at commit unless another transaction committed a newer
//! version of one of its keys first (first-committer-wins).
//!
//! ## Quick Start
//!
//! ```
//! use snapkv::prelude::*;
//!
//! let db: SnapKv<String, i64> = SnapKv::new();
//!
//! let t1 = db.begin_transaction();
//! db.write(t1, "x".to_string(), 1).unwrap();
//! assert_eq!(db.commit(t1).unwrap(), CommitOutcome::Committed { version: 1 });
//!
//! let t3 = db.begin_transaction();
//! let t4 = db.begin_transaction();
//! db.write(t3, "x".to_string(), 2).unwrap();
//! db.write(t4, "x".to_string(), 3).unwrap();
//! assert!(db.commit(t3).unwrap().is_committed());
//! assert!(db.commit(t4).unwrap().is_aborted());
//! ```
//!
//! ## Layers
//!
//! - [`snapkv_storage`]: version chains and the sharded version store
//! - [`snapkv_concurrency`]: registry, manager, commit coordinator
//! - this crate: configuration, closure transactions, background maintenance

#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod maintenance;
mod types;

pub mod prelude;

// Re-export main entry points
pub use config::{Config, GcPolicy, RetryConfig};
pub use database::{SnapKv, SnapKvBuilder, Txn};
pub use error::{Error, Result};

// Re-export types
pub use types::*;
