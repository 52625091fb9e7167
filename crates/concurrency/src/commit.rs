//! Commit coordinator
//!
//! Owns the global version counter and the commit lock. Every commit runs
//! this sequence:
//!
//! ```text
//! 1. begin_commit()    - Active → Committing, take the write buffer
//! 2. empty buffer?     - finalize Committed, no version consumed
//! 3. acquire commit lock
//! 4. conflict check    - any key with latest_version > snapshot aborts
//! 5. append entries    - every key at current_version + 1
//! 6. publish counter   - store(current_version + 1)
//! 7. finalize Committed, release lock
//! ```
//!
//! Entries are appended before the counter moves, so a transaction that
//! begins mid-commit takes the old snapshot and never sees a half-applied
//! commit. The counter is only written while the lock is held.

use crate::registry::TransactionRegistry;
use crate::transaction::CommitOutcome;
use parking_lot::Mutex;
use snapkv_core::{AbortReason, Error, Result, TransactionStatus, TxnId, Version};
use snapkv_storage::VersionStore;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Conflict detection and atomic publication of transaction writes
///
/// # Thread Safety
///
/// Commits are serialized via an internal lock to prevent TOCTOU races
/// between the conflict check and publication. Without it:
/// 1. T1 checks `x` (latest 1, snapshot 1, ok)
/// 2. T2 checks `x` (latest still 1, ok)
/// 3. T1 appends `x` at 2
/// 4. T2 appends `x` at 3 on a stale check
pub struct CommitCoordinator {
    /// Global version counter
    ///
    /// Monotonically increasing. Each commit that writes something
    /// increments it by exactly 1.
    version: AtomicU64,

    /// Commit serialization lock
    commit_lock: Mutex<()>,
}

impl CommitCoordinator {
    /// Create a coordinator starting at `initial_version`
    pub fn new(initial_version: Version) -> Self {
        CommitCoordinator {
            version: AtomicU64::new(initial_version),
            commit_lock: Mutex::new(()),
        }
    }

    /// Latest published commit version
    #[inline]
    pub fn current_version(&self) -> Version {
        self.version.load(Ordering::Acquire)
    }

    /// Validate and publish the writes of transaction `id`
    ///
    /// # Returns
    ///
    /// - `Ok(Committed { version })` when writes were published
    /// - `Ok(ReadOnly { snapshot })` when nothing was buffered
    /// - `Ok(Aborted { conflicts })` on a write-write conflict
    ///
    /// # Errors
    ///
    /// - `TransactionNotFound` / `InvalidState` for caller misuse
    /// - `InvariantViolation` if a chain is ahead of the published counter
    pub fn commit<K, V>(
        &self,
        id: TxnId,
        registry: &TransactionRegistry<K, V>,
        store: &VersionStore<K, V>,
    ) -> Result<CommitOutcome<K>>
    where
        K: Eq + Hash + Clone,
        V: Clone,
    {
        let (snapshot, writes) = registry.begin_commit(id)?;

        if writes.is_empty() {
            registry.finalize(id, TransactionStatus::Committed)?;
            return Ok(CommitOutcome::ReadOnly { snapshot });
        }

        let _commit_guard = self.commit_lock.lock();
        let current = self.version.load(Ordering::Acquire);

        let mut conflicts = Vec::new();
        for key in writes.keys() {
            if let Some(latest) = store.latest_version(key) {
                if latest > current {
                    let reason = format!(
                        "chain at version {} ahead of published version {}",
                        latest, current
                    );
                    tracing::error!(txn_id = %id, latest, current, "Commit invariant violated");
                    // Release the record; the buffer is already gone
                    release_after_failure(
                        registry,
                        id,
                        TransactionStatus::Aborted(AbortReason::Conflict),
                    );
                    return Err(Error::InvariantViolation(reason));
                }
                if latest > snapshot {
                    conflicts.push(key.clone());
                }
            }
        }

        if !conflicts.is_empty() {
            registry.finalize(id, TransactionStatus::Aborted(AbortReason::Conflict))?;
            tracing::debug!(
                txn_id = %id,
                snapshot,
                conflicts = conflicts.len(),
                "Commit aborted on write-write conflict"
            );
            return Ok(CommitOutcome::Aborted { conflicts });
        }

        let commit_version = current + 1;
        let key_count = writes.len();
        let mut append_error = None;
        for (key, value) in writes {
            if let Err(e) = store.append(key, commit_version, value) {
                tracing::error!(txn_id = %id, commit_version, error = %e, "Append failed during publish");
                append_error.get_or_insert(e);
            }
        }

        // Publish even on a failed append so no later commit reuses this version
        self.version.store(commit_version, Ordering::Release);

        if let Some(e) = append_error {
            release_after_failure(registry, id, TransactionStatus::Committed);
            return Err(e);
        }

        registry.finalize(id, TransactionStatus::Committed)?;
        tracing::debug!(txn_id = %id, snapshot, commit_version, keys = key_count, "Committed");
        Ok(CommitOutcome::Committed {
            version: commit_version,
        })
    }
}

/// Finalize on an error path where the commit error must win
fn release_after_failure<K, V>(
    registry: &TransactionRegistry<K, V>,
    id: TxnId,
    outcome: TransactionStatus,
) where
    K: Eq + Hash + Clone,
    V: Clone,
{
    if let Err(e) = registry.finalize(id, outcome) {
        tracing::error!(txn_id = %id, %outcome, error = %e, "Finalize failed after commit error");
    }
}

impl Default for CommitCoordinator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for CommitCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitCoordinator")
            .field("version", &self.current_version())
            .finish()
    }
}
