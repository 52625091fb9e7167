//! Transaction counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free transaction counters
#[derive(Debug, Default)]
pub struct TransactionMetrics {
    begun: AtomicU64,
    committed: AtomicU64,
    read_only: AtomicU64,
    conflicts: AtomicU64,
    rolled_back: AtomicU64,
    reaped: AtomicU64,
    gc_runs: AtomicU64,
    versions_reclaimed: AtomicU64,
}

/// Point-in-time copy of [`TransactionMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Transactions begun
    pub begun: u64,
    /// Commits that published a version
    pub committed: u64,
    /// Commits with an empty write buffer
    pub read_only: u64,
    /// Commits aborted by a write-write conflict
    pub conflicts: u64,
    /// Explicit rollbacks
    pub rolled_back: u64,
    /// Transactions force-aborted for idleness
    pub reaped: u64,
    /// Garbage-collection passes
    pub gc_runs: u64,
    /// Chain entries and keys removed by GC
    pub versions_reclaimed: u64,
}

impl MetricsSnapshot {
    /// Fraction of finished commit attempts that conflicted
    pub fn conflict_rate(&self) -> f64 {
        let attempts = self.committed + self.read_only + self.conflicts;
        if attempts == 0 {
            0.0
        } else {
            self.conflicts as f64 / attempts as f64
        }
    }
}

impl TransactionMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_begin(&self) {
        self.begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read_only(&self) {
        self.read_only.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reaped(&self, count: usize) {
        self.reaped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_gc(&self, reclaimed: usize) {
        self.gc_runs.fetch_add(1, Ordering::Relaxed);
        self.versions_reclaimed
            .fetch_add(reclaimed as u64, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            begun: self.begun.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            read_only: self.read_only.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            reaped: self.reaped.load(Ordering::Relaxed),
            gc_runs: self.gc_runs.load(Ordering::Relaxed),
            versions_reclaimed: self.versions_reclaimed.load(Ordering::Relaxed),
        }
    }
}
