//! snapkv Integration Test Suite
//!
//! Exercises the public `SnapKv` API end to end.
//!
//! ## Modules
//!
//! - `snapshot_isolation`: Snapshot reads, read-your-own-writes, deletes
//! - `conflicts`: First-committer-wins and non-conflicting commits
//! - `lifecycle`: Rollback, double finalize, unknown ids, idle timeout
//! - `gc`: Minimum-active-snapshot garbage collection
//! - `concurrency`: Multi-threaded contention and publication atomicity
//! - `model`: Property tests against a sequential reference model
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test integration
//! cargo test --test integration conflicts::
//! ```

use std::sync::Arc;

pub use snapkv::prelude::*;

// Test modules
pub mod concurrency;
pub mod gc;
pub mod model;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Install a test-writer subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a store with default settings
pub fn create_db() -> SnapKv<String, i64> {
    init_tracing();
    SnapKv::new()
}

/// Create a shareable store
pub fn create_shared_db() -> Arc<SnapKv<String, i64>> {
    Arc::new(create_db())
}

/// Shorthand for owned string keys
pub fn key(name: &str) -> String {
    name.to_string()
}

/// Commit a single write in its own transaction, returning the version
pub fn commit_one(db: &SnapKv<String, i64>, name: &str, value: i64) -> Version {
    let t = db.begin_transaction();
    db.write(t, key(name), value).unwrap();
    db.commit(t)
        .unwrap()
        .version()
        .expect("single write must consume a version")
}
