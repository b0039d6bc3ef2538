//! Admission errors.

use bulkhead_guard_core::CallError;

/// Why the bulkhead did not hand out a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError {
    /// No permit was free and the bulkhead has no waiting area.
    #[error("bulkhead is full: max concurrent calls ({max_concurrent_calls}) reached")]
    BulkheadFull {
        /// Maximum concurrent calls allowed.
        max_concurrent_calls: usize,
    },
    /// No permit was free and the waiting area was already full.
    #[error("bulkhead queue is full: max queued calls ({max_queued_calls}) reached")]
    QueueFull {
        /// Maximum number of callers allowed to wait.
        max_queued_calls: usize,
    },
    /// The caller waited longer than `max_wait_duration` and left the queue.
    #[error("timeout waiting for bulkhead permit")]
    Timeout,
    /// The caller was cancelled while queued.
    #[error("cancelled while waiting for bulkhead permit")]
    Cancelled,
}

impl BulkheadError {
    /// Returns `true` if the caller was turned away without ever waiting.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            BulkheadError::BulkheadFull { .. } | BulkheadError::QueueFull { .. }
        )
    }

    /// Returns `true` if the caller waited and then gave up or was cancelled.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BulkheadError::Timeout | BulkheadError::Cancelled)
    }
}

/// Result type for admission operations.
pub type Result<T> = std::result::Result<T, BulkheadError>;

impl<E> From<BulkheadError> for CallError<E> {
    fn from(err: BulkheadError) -> Self {
        match err {
            BulkheadError::BulkheadFull {
                max_concurrent_calls,
            } => CallError::BulkheadFull {
                max_concurrent_calls,
            },
            BulkheadError::QueueFull { max_queued_calls } => {
                CallError::QueueFull { max_queued_calls }
            }
            BulkheadError::Timeout => CallError::Timeout { layer: "bulkhead" },
            BulkheadError::Cancelled => CallError::Cancelled { layer: "bulkhead" },
        }
    }
}
