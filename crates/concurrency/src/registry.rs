//! Transaction registry
//!
//! Maps transaction ids to their state. Ids come from a monotonically
//! increasing counter and are never reused. A record is removed when its
//! transaction is finalized; the only exception is a transaction aborted
//! by the idle reaper, which stays behind as a tombstone so its owner gets
//! `InvalidState` rather than `TransactionNotFound`.

use crate::transaction::{
    BufferedRead, FinalizedTransaction, TransactionInfo, TransactionState, WriteBuffer,
};
use dashmap::DashMap;
use rustc_hash::FxHasher;
use snapkv_core::{AbortReason, Error, Result, TransactionStatus, TxnId, Version};
use std::hash::{BuildHasherDefault, Hash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Lifecycle bookkeeping for transaction ids
pub struct TransactionRegistry<K, V> {
    txns: DashMap<TxnId, TransactionState<K, V>, FxBuildHasher>,
    next_id: AtomicU64,
}

impl<K, V> TransactionRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty registry; the first id issued is 1
    pub fn new() -> Self {
        Self {
            txns: DashMap::with_hasher(FxBuildHasher::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new Active transaction reading at `snapshot`
    pub fn begin(&self, snapshot: Version) -> TxnId {
        let id = TxnId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.txns.insert(id, TransactionState::new(snapshot));
        id
    }

    /// Look up a transaction
    pub fn get(&self, id: TxnId) -> Result<TransactionInfo> {
        let state = self
            .txns
            .get(&id)
            .ok_or(Error::TransactionNotFound { txn_id: id })?;
        Ok(TransactionInfo {
            id,
            snapshot: state.snapshot,
            status: state.status,
            pending_writes: state.writes.len(),
            age: state.started_at.elapsed(),
            idle: state.last_activity.elapsed(),
        })
    }

    /// Fail unless the transaction exists and is Active
    pub fn ensure_active(&self, id: TxnId) -> Result<()> {
        let state = self
            .txns
            .get(&id)
            .ok_or(Error::TransactionNotFound { txn_id: id })?;
        check_active(id, &state)
    }

    /// Resolve a read against the write buffer
    ///
    /// Returns the buffered value when the key was written by this
    /// transaction, otherwise the snapshot the caller should read the
    /// store at.
    pub(crate) fn buffered_read(&self, id: TxnId, key: &K) -> Result<BufferedRead<V>> {
        let mut state = self
            .txns
            .get_mut(&id)
            .ok_or(Error::TransactionNotFound { txn_id: id })?;
        check_active(id, &state)?;
        state.touch();
        Ok(match state.writes.get(key) {
            Some(buffered) => BufferedRead::Buffered(buffered.clone()),
            None => BufferedRead::Unbuffered(state.snapshot),
        })
    }

    /// Buffer a write (`Some`) or delete (`None`) for `key`
    ///
    /// Overwrites any earlier buffered value for the same key.
    pub fn buffer_write(&self, id: TxnId, key: K, value: Option<V>) -> Result<()> {
        let mut state = self
            .txns
            .get_mut(&id)
            .ok_or(Error::TransactionNotFound { txn_id: id })?;
        check_active(id, &state)?;
        state.touch();
        state.writes.insert(key, value);
        Ok(())
    }

    /// Move an Active transaction to Committing and hand over its buffer
    ///
    /// While Committing, every other operation on the id fails with
    /// `InvalidState`.
    pub(crate) fn begin_commit(&self, id: TxnId) -> Result<(Version, WriteBuffer<K, V>)> {
        let mut state = self
            .txns
            .get_mut(&id)
            .ok_or(Error::TransactionNotFound { txn_id: id })?;
        check_active(id, &state)?;
        state.status = TransactionStatus::Committing;
        Ok((state.snapshot, std::mem::take(&mut state.writes)))
    }

    /// Remove a transaction with a terminal `outcome`
    ///
    /// Allowed transitions:
    /// - `Committing` → `Committed` | `Aborted(Conflict)`
    /// - `Active` → `Aborted(Rollback)`
    /// - `Aborted(IdleTimeout)` → `Aborted(Rollback)` (owner acknowledges the reap)
    ///
    /// # Errors
    ///
    /// - `TransactionNotFound` if the id is unknown or already finalized
    /// - `InvalidState` if the transition is not allowed from the current status
    pub fn finalize(&self, id: TxnId, outcome: TransactionStatus) -> Result<FinalizedTransaction> {
        if !outcome.is_terminal() {
            return Err(Error::InvariantViolation(format!(
                "finalize {} with non-terminal status {}",
                id, outcome
            )));
        }

        match self
            .txns
            .remove_if(&id, |_, state| can_finalize(state.status, outcome))
        {
            Some((_, state)) => Ok(FinalizedTransaction {
                id,
                snapshot: state.snapshot,
                outcome,
                duration: state.started_at.elapsed(),
            }),
            None => match self.txns.get(&id) {
                Some(state) => Err(Error::InvalidState {
                    txn_id: id,
                    status: state.status,
                }),
                None => Err(Error::TransactionNotFound { txn_id: id }),
            },
        }
    }

    /// Force-abort Active transactions idle for longer than `timeout`
    ///
    /// Reaped transactions drop their buffers and stop pinning their
    /// snapshot. Tombstones left by an earlier pass are purged once they
    /// have sat for another `timeout`. Returns the ids reaped by this pass.
    pub fn reap_idle(&self, timeout: Duration) -> Vec<TxnId> {
        self.txns.retain(|_, state| {
            !(state.status == TransactionStatus::Aborted(AbortReason::IdleTimeout)
                && state.last_activity.elapsed() > timeout)
        });

        let mut reaped = Vec::new();
        for mut entry in self.txns.iter_mut() {
            let state = entry.value_mut();
            if state.status.is_active() && state.last_activity.elapsed() > timeout {
                state.status = TransactionStatus::Aborted(AbortReason::IdleTimeout);
                state.writes = WriteBuffer::default();
                state.touch();
                reaped.push(*entry.key());
            }
        }
        reaped.sort_unstable();
        reaped
    }

    /// Oldest snapshot still pinned by an Active or Committing transaction
    pub fn min_active_snapshot(&self) -> Option<Version> {
        self.txns
            .iter()
            .filter(|entry| entry.value().holds_snapshot())
            .map(|entry| entry.value().snapshot)
            .min()
    }

    /// Number of Active or Committing transactions
    pub fn active_count(&self) -> usize {
        self.txns
            .iter()
            .filter(|entry| entry.value().holds_snapshot())
            .count()
    }

    /// Number of records, including reaped tombstones
    pub fn len(&self) -> usize {
        self.txns.len()
    }

    /// Whether the registry holds no records
    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }
}

impl<K, V> Default for TransactionRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

fn check_active<K, V>(id: TxnId, state: &TransactionState<K, V>) -> Result<()> {
    if state.status.is_active() {
        Ok(())
    } else {
        Err(Error::InvalidState {
            txn_id: id,
            status: state.status,
        })
    }
}

fn can_finalize(current: TransactionStatus, outcome: TransactionStatus) -> bool {
    use TransactionStatus::*;
    matches!(
        (current, outcome),
        (Committing, Committed)
            | (Committing, Aborted(AbortReason::Conflict))
            | (Active, Aborted(AbortReason::Rollback))
            | (Aborted(AbortReason::IdleTimeout), Aborted(AbortReason::Rollback))
    )
}
