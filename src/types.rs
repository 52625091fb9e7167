//! Public types re-exported from the internal crates.

pub use snapkv_concurrency::{CommitOutcome, MetricsSnapshot, TransactionInfo};
pub use snapkv_core::{AbortReason, TransactionStatus, TxnId, Version};
pub use snapkv_storage::GcStats;
