//! Event types for the bulkhead.

use bulkhead_guard_core::events::ObservedEvent;
use std::time::{Duration, Instant};

/// Why a call was turned away without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// No permit and no waiting area.
    Capacity,
    /// No permit and the waiting area was full.
    QueueFull,
}

impl RejectionReason {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::Capacity => "capacity",
            RejectionReason::QueueFull => "queue_full",
        }
    }
}

/// Events emitted by a bulkhead.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call obtained a permit.
    CallPermitted {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Calls in flight, including this one.
        concurrent_calls: usize,
        /// Time spent waiting for the permit.
        waited: Duration,
    },
    /// A call joined the waiting area.
    CallQueued {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Callers waiting, including this one.
        queue_depth: usize,
    },
    /// A call was turned away without waiting.
    CallRejected {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Maximum concurrent calls allowed.
        max_concurrent_calls: usize,
        /// Which limit was hit.
        reason: RejectionReason,
    },
    /// A queued call gave up or was cancelled before obtaining a permit.
    CallCancelled {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Time spent waiting before leaving the queue.
        waited: Duration,
        /// `true` if the wait bound expired rather than an explicit cancel.
        timed_out: bool,
    },
    /// An admitted call completed successfully.
    CallFinished {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Time the permit was held.
        duration: Duration,
    },
    /// An admitted call failed, panicked, or was abandoned.
    CallFailed {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Time the permit was held.
        duration: Duration,
    },
}

impl ObservedEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallQueued { .. } => "call_queued",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallCancelled { .. } => "call_cancelled",
            BulkheadEvent::CallFinished { .. } => "call_finished",
            BulkheadEvent::CallFailed { .. } => "call_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallQueued { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::CallCancelled { timestamp, .. }
            | BulkheadEvent::CallFinished { timestamp, .. }
            | BulkheadEvent::CallFailed { timestamp, .. } => *timestamp,
        }
    }

    fn bulkhead_name(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { pattern_name, .. }
            | BulkheadEvent::CallQueued { pattern_name, .. }
            | BulkheadEvent::CallRejected { pattern_name, .. }
            | BulkheadEvent::CallCancelled { pattern_name, .. }
            | BulkheadEvent::CallFinished { pattern_name, .. }
            | BulkheadEvent::CallFailed { pattern_name, .. } => pattern_name,
        }
    }
}
