//! Transaction manager counters
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on manager construction

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters of one transaction manager
///
/// All counters use Relaxed atomics; readers only need eventual values.
#[derive(Debug, Default)]
pub struct TxnMetrics {
    committed: AtomicU64,
    failed: AtomicU64,
    undone: AtomicU64,
    undo_failures: AtomicU64,
    redone: AtomicU64,
    redo_failures: AtomicU64,
    queue_timeouts: AtomicU64,
    late_settlements: AtomicU64,
    history_clears: AtomicU64,
    batches: AtomicU64,
    batch_item_failures: AtomicU64,
}

impl TxnMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_committed(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_undone(&self) {
        self.undone.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_undo_failures(&self) {
        self.undo_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_redone(&self) {
        self.redone.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_redo_failures(&self) {
        self.redo_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queue_timeouts(&self) {
        self.queue_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_late_settlements(&self) {
        self.late_settlements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_history_clears(&self) {
        self.history_clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_batches(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_batch_item_failures(&self) {
        self.batch_item_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all counters as a snapshot
    pub fn snapshot(&self) -> TxnMetricsSnapshot {
        TxnMetricsSnapshot {
            committed: self.committed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            undone: self.undone.load(Ordering::Relaxed),
            undo_failures: self.undo_failures.load(Ordering::Relaxed),
            redone: self.redone.load(Ordering::Relaxed),
            redo_failures: self.redo_failures.load(Ordering::Relaxed),
            queue_timeouts: self.queue_timeouts.load(Ordering::Relaxed),
            late_settlements: self.late_settlements.load(Ordering::Relaxed),
            history_clears: self.history_clears.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            batch_item_failures: self.batch_item_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TxnMetricsSnapshot {
    pub committed: u64,
    pub failed: u64,
    pub undone: u64,
    pub undo_failures: u64,
    pub redone: u64,
    pub redo_failures: u64,
    pub queue_timeouts: u64,
    pub late_settlements: u64,
    pub history_clears: u64,
    pub batches: u64,
    pub batch_item_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        assert_eq!(TxnMetrics::new().snapshot(), TxnMetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let metrics = TxnMetrics::new();

        metrics.increment_committed();
        metrics.increment_committed();
        metrics.increment_undone();
        metrics.increment_redo_failures();
        metrics.increment_queue_timeouts();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.committed, 2);
        assert_eq!(snapshot.undone, 1);
        assert_eq!(snapshot.redo_failures, 1);
        assert_eq!(snapshot.queue_timeouts, 1);
        assert_eq!(snapshot.failed, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = TxnMetrics::new();
        metrics.increment_batches();

        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["batches"], 1);
        assert_eq!(json["committed"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(TxnMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.increment_committed();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.snapshot().committed, 800);
    }
}
