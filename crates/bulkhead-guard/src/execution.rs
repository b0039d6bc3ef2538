//! Admitted and pending calls.
//!
//! A call moves through three owners:
//!
//! - [`Reservation`]: asked for a permit, possibly still queued.
//! - [`Execution`]: holds a permit; records the outcome when it finishes.
//! - [`InFlight`]: an [`Execution`] attached to a deferred result, released
//!   when that result resolves.
//!
//! Each owner settles exactly once. Dropping one early settles it too:
//! a dropped reservation counts as cancelled, a dropped execution as failed,
//! and either way the permit or queue slot goes back to the pool.

use crate::bulkhead::Bulkhead;
use crate::error::{BulkheadError, Result};
use crate::pool::Permit;
use crate::queue::{CancelHandle, QueueTicket};
use pin_project_lite::pin_project;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::{Duration, Instant};

/// A request for a permit that may still be waiting in the queue.
///
/// Obtained from [`Bulkhead::reserve`]. Use [`cancel_handle`](Self::cancel_handle)
/// to let another context (a timeout policy, a shutdown hook) withdraw the
/// request while it waits.
#[must_use = "dropping a reservation cancels it"]
pub struct Reservation {
    ticket: QueueTicket,
    pending: Pending,
}

impl Reservation {
    pub(crate) fn new(bulkhead: Bulkhead, ticket: QueueTicket, started: Instant) -> Self {
        Self {
            ticket,
            pending: Pending {
                bulkhead,
                started,
                armed: true,
            },
        }
    }

    /// Returns `true` if a permit is ready for this reservation.
    pub fn is_granted(&self) -> bool {
        self.ticket.is_granted()
    }

    /// Returns `true` while the reservation waits in the queue.
    pub fn is_waiting(&self) -> bool {
        self.ticket.is_waiting()
    }

    /// A handle that withdraws this reservation from another thread or task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.ticket.cancel_handle()
    }

    /// Withdraws the reservation.
    ///
    /// Returns `true` if it left the queue before a permit reached it. The
    /// call is counted as cancelled either way, and a permit that had already
    /// been granted goes to the next waiter.
    pub fn cancel(self) -> bool {
        let Reservation { ticket, pending } = self;
        let removed = ticket.cancel();
        drop(pending);
        removed
    }

    /// Waits for the permit, suspending the current task.
    ///
    /// The wait is bounded by the bulkhead's `max_wait_duration`, measured
    /// from when the reservation was made. A bounded wait is timed by tokio,
    /// so poll this inside a runtime with the time driver enabled.
    pub async fn wait(self) -> Result<Execution> {
        let Reservation { ticket, pending } = self;
        let result = ticket.wait(pending.deadline()).await;
        pending.settle(result)
    }

    /// Waits for the permit, blocking the current thread.
    pub fn wait_blocking(self) -> Result<Execution> {
        let Reservation { ticket, pending } = self;
        let result = ticket.wait_blocking(pending.deadline());
        pending.settle(result)
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("bulkhead", &self.pending.bulkhead.name())
            .field("ticket", &self.ticket)
            .finish()
    }
}

// Records the Pending -> {Executing | Cancelled} transition exactly once.
struct Pending {
    bulkhead: Bulkhead,
    started: Instant,
    armed: bool,
}

impl Pending {
    fn deadline(&self) -> Option<Instant> {
        self.bulkhead
            .config()
            .max_wait_duration()
            .and_then(|wait| self.started.checked_add(wait))
    }

    fn settle(mut self, result: Result<Permit>) -> Result<Execution> {
        self.armed = false;
        let waited = self.started.elapsed();
        match result {
            Ok(permit) => Ok(Execution::start(self.bulkhead.clone(), permit, waited)),
            Err(err) => {
                self.bulkhead.inner().on_cancelled(&err, waited);
                Err(err)
            }
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        if self.armed {
            self.bulkhead
                .inner()
                .on_cancelled(&BulkheadError::Cancelled, self.started.elapsed());
        }
    }
}

/// A call that holds a permit.
///
/// The permit is released when the execution is completed or dropped,
/// whichever comes first. Dropping without completing (including unwinding
/// from a panic) records the call as failed.
#[must_use = "dropping an execution releases its permit"]
pub struct Execution {
    bulkhead: Bulkhead,
    permit: Option<Permit>,
    started: Instant,
}

impl Execution {
    pub(crate) fn start(bulkhead: Bulkhead, permit: Permit, waited: Duration) -> Self {
        bulkhead.inner().on_permitted(waited);
        Self {
            bulkhead,
            permit: Some(permit),
            started: Instant::now(),
        }
    }

    /// Time since the permit was obtained.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Releases the permit and records the outcome of `result`.
    pub fn complete<T, E>(self, result: &std::result::Result<T, E>) {
        self.finish(result.is_ok());
    }

    /// Attaches the permit to a deferred result.
    ///
    /// The permit stays held until `future` resolves, however long after
    /// this call that is.
    pub fn guard<F>(self, future: F) -> InFlight<F> {
        InFlight {
            future,
            execution: Some(self),
        }
    }

    fn finish(mut self, succeeded: bool) {
        self.settle(succeeded);
    }

    fn settle(&mut self, succeeded: bool) {
        if let Some(permit) = self.permit.take() {
            drop(permit);
            self.bulkhead
                .inner()
                .on_finished(succeeded, self.started.elapsed());
        }
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        self.settle(false);
    }
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("bulkhead", &self.bulkhead.name())
            .field("elapsed", &self.started.elapsed())
            .finish()
    }
}

pin_project! {
    /// A deferred result that holds a bulkhead permit until it resolves.
    ///
    /// Returned by [`Bulkhead::submit`] and [`Execution::guard`]. Resolving
    /// releases the permit before the output is handed back; dropping it
    /// unresolved releases the permit and records the call as failed.
    #[must_use = "futures do nothing unless polled"]
    pub struct InFlight<F> {
        #[pin]
        future: F,
        execution: Option<Execution>,
    }
}

impl<F> InFlight<F> {
    /// Returns `true` until the deferred result has resolved.
    pub fn is_holding_permit(&self) -> bool {
        self.execution.is_some()
    }
}

impl<F, T, E> Future for InFlight<F>
where
    F: Future<Output = std::result::Result<T, E>>,
{
    type Output = std::result::Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.future.poll(cx));
        if let Some(execution) = this.execution.take() {
            execution.complete(&result);
        }
        Poll::Ready(result)
    }
}

impl<F> fmt::Debug for InFlight<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("execution", &self.execution)
            .finish()
    }
}
