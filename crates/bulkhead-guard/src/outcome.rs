//! Per-call outcomes.

use crate::error::BulkheadError;
use bulkhead_guard_core::CallError;

/// The tag of an [`ExecutionOutcome`], also used to index observer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// Admitted; the operation succeeded.
    Completed,
    /// Admitted; the operation failed, panicked or was abandoned.
    Failed,
    /// No permit and no waiting area.
    RejectedCapacity,
    /// No permit and the waiting area was full.
    RejectedQueueFull,
    /// Queued, then timed out or cancelled before a permit arrived.
    Cancelled,
}

impl OutcomeKind {
    /// Every kind, in counter order.
    pub const ALL: [OutcomeKind; 5] = [
        OutcomeKind::Completed,
        OutcomeKind::Failed,
        OutcomeKind::RejectedCapacity,
        OutcomeKind::RejectedQueueFull,
        OutcomeKind::Cancelled,
    ];

    /// The outcome kind an admission error ends in.
    pub fn of_error(err: &BulkheadError) -> Self {
        match err {
            BulkheadError::BulkheadFull { .. } => OutcomeKind::RejectedCapacity,
            BulkheadError::QueueFull { .. } => OutcomeKind::RejectedQueueFull,
            BulkheadError::Timeout | BulkheadError::Cancelled => OutcomeKind::Cancelled,
        }
    }
}

/// What happened to one guarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome<T, E> {
    /// The operation ran and returned `Ok`.
    Completed(T),
    /// The operation ran and returned `Err`.
    Failed(E),
    /// The operation never ran.
    Rejected(BulkheadError),
}

impl<T, E> ExecutionOutcome<T, E> {
    /// The outcome's tag.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ExecutionOutcome::Completed(_) => OutcomeKind::Completed,
            ExecutionOutcome::Failed(_) => OutcomeKind::Failed,
            ExecutionOutcome::Rejected(err) => OutcomeKind::of_error(err),
        }
    }

    /// Returns `true` if the operation ran, whatever its result.
    pub fn was_admitted(&self) -> bool {
        !matches!(self, ExecutionOutcome::Rejected(_))
    }

    /// Returns `true` if the operation ran and succeeded.
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed(_))
    }

    /// Converts into a `Result`, folding admission failures into [`CallError`].
    ///
    /// ```
    /// use bulkhead_guard::{BulkheadError, ExecutionOutcome};
    ///
    /// let outcome: ExecutionOutcome<u32, String> =
    ///     ExecutionOutcome::Rejected(BulkheadError::Timeout);
    /// assert!(outcome.into_result().unwrap_err().is_cancelled());
    /// ```
    pub fn into_result(self) -> Result<T, CallError<E>> {
        match self {
            ExecutionOutcome::Completed(value) => Ok(value),
            ExecutionOutcome::Failed(err) => Err(CallError::Operation(err)),
            ExecutionOutcome::Rejected(err) => Err(err.into()),
        }
    }

    pub(crate) fn from_result(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => ExecutionOutcome::Completed(value),
            Err(err) => ExecutionOutcome::Failed(err),
        }
    }
}
