//! Convenient imports for snapkv.
//!
//! ```
//! use snapkv::prelude::*;
//!
//! let db: SnapKv<String, String> = SnapKv::new();
//! let t = db.begin_transaction();
//! db.write(t, "k".into(), "v".into()).unwrap();
//! assert!(db.commit(t).unwrap().is_committed());
//! ```

// Main entry point
pub use crate::database::{SnapKv, SnapKvBuilder, Txn};

// Configuration
pub use crate::config::{Config, GcPolicy, RetryConfig};

// Error handling
pub use crate::error::{Error, Result};

// Core types
pub use crate::types::{CommitOutcome, GcStats, TransactionStatus, TxnId, Version};
