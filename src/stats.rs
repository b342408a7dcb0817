//! Running totals for the life of the worker process.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the consume loop and every in-flight send task.
#[derive(Debug, Default)]
pub struct WorkerStats {
    consumed: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    total: AtomicU64,
}

/// A point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Valid messages handed to a send task
    pub consumed: u64,
    /// Emails sent and acked
    pub successful: u64,
    /// Rejected messages plus failed sends
    pub failed: u64,
    /// Messages fully settled
    pub total: u64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A valid message was dispatched.
    pub fn record_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    /// A send finished successfully.
    pub fn record_success(&self) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// A message was rejected or its send failed.
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            consumed: self.consumed.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }
}
