//! The caller-facing error of a guarded call.
//!
//! A guarded call can fail in two unrelated ways: the bulkhead never admitted
//! it, or it ran and the protected operation itself failed. [`CallError`] keeps
//! both in one type so callers can use `?` across the guard boundary and still
//! tell the cases apart:
//!
//! ```rust
//! use bulkhead_guard_core::CallError;
//!
//! fn describe(err: &CallError<std::io::Error>) -> &'static str {
//!     match err {
//!         CallError::BulkheadFull { .. } => "no permit and no room to wait",
//!         CallError::QueueFull { .. } => "waiting room full",
//!         CallError::Timeout { .. } | CallError::Cancelled { .. } => "gave up waiting",
//!         CallError::Operation(_) => "operation failed",
//!     }
//! }
//!
//! let err: CallError<std::io::Error> = CallError::QueueFull { max_queued_calls: 4 };
//! assert_eq!(describe(&err), "waiting room full");
//! assert!(err.is_rejected());
//! ```

/// Why a guarded call did not produce a value.
///
/// `E` is the protected operation's error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError<E> {
    /// No permit was free and the caller could not wait for one.
    #[error("bulkhead full: {max_concurrent_calls} concurrent calls in flight")]
    BulkheadFull {
        /// Capacity of the bulkhead.
        max_concurrent_calls: usize,
    },

    /// The waiting area was at capacity; the caller was never queued.
    #[error("bulkhead queue full: {max_queued_calls} callers already waiting")]
    QueueFull {
        /// Capacity of the waiting area.
        max_queued_calls: usize,
    },

    /// The caller waited for a permit for longer than allowed.
    #[error("timeout in {layer} while waiting for a permit")]
    Timeout {
        /// The layer that gave up, e.g. `"bulkhead"`.
        layer: &'static str,
    },

    /// The caller was cancelled while waiting for a permit.
    #[error("cancelled in {layer} while waiting for a permit")]
    Cancelled {
        /// The layer the caller was waiting in.
        layer: &'static str,
    },

    /// The call was admitted and the protected operation failed.
    #[error("operation failed: {0}")]
    Operation(E),
}

impl<E> CallError<E> {
    /// Returns `true` if the call was turned away without waiting.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            CallError::BulkheadFull { .. } | CallError::QueueFull { .. }
        )
    }

    /// Returns `true` if the caller gave up (or was told to give up) while queued.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CallError::Timeout { .. } | CallError::Cancelled { .. })
    }

    /// Returns `true` if the call ran and the operation failed.
    pub fn is_operation(&self) -> bool {
        matches!(self, CallError::Operation(_))
    }

    /// Extracts the operation error, if any.
    pub fn operation_error(self) -> Option<E> {
        match self {
            CallError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the operation error, leaving admission failures untouched.
    ///
    /// ```
    /// use bulkhead_guard_core::CallError;
    ///
    /// let err: CallError<String> = CallError::Operation("disk".to_string());
    /// assert_eq!(err.map_operation(|s| s.len()).operation_error(), Some(4));
    /// ```
    pub fn map_operation<F, T>(self, f: F) -> CallError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            CallError::BulkheadFull {
                max_concurrent_calls,
            } => CallError::BulkheadFull {
                max_concurrent_calls,
            },
            CallError::QueueFull { max_queued_calls } => CallError::QueueFull { max_queued_calls },
            CallError::Timeout { layer } => CallError::Timeout { layer },
            CallError::Cancelled { layer } => CallError::Cancelled { layer },
            CallError::Operation(e) => CallError::Operation(f(e)),
        }
    }
}
