//! Read-only view of a bulkhead for external monitoring.
//!
//! All values are plain atomic loads, so polling never blocks callers that
//! are acquiring or releasing. Fields are read one by one; a snapshot taken
//! while calls are moving is approximate, but once the bulkhead is idle the
//! outcome counters add up to exactly the number of calls issued.

use crate::outcome::OutcomeKind;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct Counters {
    completed: AtomicU64,
    failed: AtomicU64,
    rejected_capacity: AtomicU64,
    rejected_queue_full: AtomicU64,
    cancelled: AtomicU64,
}

impl Counters {
    pub(crate) fn record(&self, kind: OutcomeKind) {
        self.slot(kind).fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn get(&self, kind: OutcomeKind) -> u64 {
        self.slot(kind).load(Ordering::Relaxed)
    }

    fn slot(&self, kind: OutcomeKind) -> &AtomicU64 {
        match kind {
            OutcomeKind::Completed => &self.completed,
            OutcomeKind::Failed => &self.failed,
            OutcomeKind::RejectedCapacity => &self.rejected_capacity,
            OutcomeKind::RejectedQueueFull => &self.rejected_queue_full,
            OutcomeKind::Cancelled => &self.cancelled,
        }
    }
}

/// Point-in-time view of a bulkhead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkheadSnapshot {
    /// Maximum number of concurrently executing calls.
    pub max_concurrent_calls: usize,
    /// Size of the waiting area, if any.
    pub max_queued_calls: Option<usize>,
    /// Calls currently holding a permit, deferred work included.
    pub in_flight: usize,
    /// Calls currently waiting for a permit.
    pub queued: usize,
    /// Calls that ran and succeeded.
    pub completed: u64,
    /// Calls that ran and failed.
    pub failed: u64,
    /// Calls rejected because no permit and no waiting area was available.
    pub rejected_capacity: u64,
    /// Calls rejected because the waiting area was full.
    pub rejected_queue_full: u64,
    /// Calls that left the waiting area without a permit.
    pub cancelled: u64,
}

impl BulkheadSnapshot {
    pub(crate) fn new(
        max_concurrent_calls: usize,
        max_queued_calls: Option<usize>,
        in_flight: usize,
        queued: usize,
        counters: &Counters,
    ) -> Self {
        Self {
            max_concurrent_calls,
            max_queued_calls,
            in_flight,
            queued,
            completed: counters.get(OutcomeKind::Completed),
            failed: counters.get(OutcomeKind::Failed),
            rejected_capacity: counters.get(OutcomeKind::RejectedCapacity),
            rejected_queue_full: counters.get(OutcomeKind::RejectedQueueFull),
            cancelled: counters.get(OutcomeKind::Cancelled),
        }
    }

    /// Counter for one outcome kind.
    pub fn count(&self, kind: OutcomeKind) -> u64 {
        match kind {
            OutcomeKind::Completed => self.completed,
            OutcomeKind::Failed => self.failed,
            OutcomeKind::RejectedCapacity => self.rejected_capacity,
            OutcomeKind::RejectedQueueFull => self.rejected_queue_full,
            OutcomeKind::Cancelled => self.cancelled,
        }
    }

    /// Calls that reached a terminal outcome.
    pub fn total_calls(&self) -> u64 {
        OutcomeKind::ALL.iter().map(|kind| self.count(*kind)).sum()
    }

    /// Calls turned away without waiting.
    pub fn rejected(&self) -> u64 {
        self.rejected_capacity + self.rejected_queue_full
    }
}
