//! The bounded waiting area.
//!
//! A caller that finds the pool exhausted gets a [`QueueTicket`] and waits on
//! it, either by blocking its thread ([`QueueTicket::wait_blocking`]) or by
//! awaiting [`QueueTicket::wait`]. Waiters are granted permits strictly in
//! arrival order.
//!
//! A waiter leaves the queue in exactly one of three ways, each decided under
//! the pool lock: it is granted, it is cancelled ([`CancelHandle::cancel`],
//! [`QueueTicket::cancel`], drop), or its deadline expires. Whichever happens
//! first wins; the others observe the outcome instead of changing it.

use crate::error::{BulkheadError, Result};
use crate::pool::{Permit, Shared};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Instant;
use tokio::time::Sleep;

/// FIFO of waiters. Only touched under the pool lock.
pub(crate) struct QueueGate {
    capacity: usize,
    waiters: VecDeque<Arc<Waiter>>,
}

impl QueueGate {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            waiters: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn try_push(&mut self, waiter: Arc<Waiter>) -> bool {
        if self.waiters.len() >= self.capacity {
            return false;
        }
        self.waiters.push_back(waiter);
        true
    }

    pub(crate) fn pop_front(&mut self) -> Option<Arc<Waiter>> {
        self.waiters.pop_front()
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        match self.waiters.iter().position(|w| w.id == id) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitState {
    Waiting,
    Granted,
    Cancelled,
    // The grant has been turned into a `Permit` or given back.
    Consumed,
}

struct Slot {
    state: WaitState,
    waker: Option<Waker>,
}

pub(crate) struct Waiter {
    id: u64,
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Waiter {
    pub(crate) fn new(id: u64, state: WaitState) -> Self {
        Self {
            id,
            slot: Mutex::new(Slot { state, waker: None }),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> WaitState {
        self.slot().state
    }

    /// Settles a queued waiter and wakes whoever is waiting on it.
    pub(crate) fn resolve(&self, state: WaitState) {
        let waker = {
            let mut slot = self.slot();
            slot.state = state;
            slot.waker.take()
        };
        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Marks an unclaimed grant as consumed; `true` if there was one.
    pub(crate) fn take_grant(&self) -> bool {
        let mut slot = self.slot();
        if slot.state == WaitState::Granted {
            slot.state = WaitState::Consumed;
            true
        } else {
            false
        }
    }
}

/// A caller's place in the waiting area, or an immediate grant.
///
/// Dropping an unresolved ticket cancels it. If a permit had already been
/// granted to it, that permit goes back to the pool.
#[must_use = "dropping a ticket gives up its place in the queue"]
pub struct QueueTicket {
    shared: Arc<Shared>,
    waiter: Arc<Waiter>,
    settled: bool,
}

impl QueueTicket {
    pub(crate) fn new(shared: Arc<Shared>, waiter: Arc<Waiter>) -> Self {
        Self {
            shared,
            waiter,
            settled: false,
        }
    }

    /// Returns `true` if a permit is waiting to be claimed by this ticket.
    pub fn is_granted(&self) -> bool {
        self.waiter.state() == WaitState::Granted
    }

    /// Returns `true` while the ticket is still queued.
    pub fn is_waiting(&self) -> bool {
        self.waiter.state() == WaitState::Waiting
    }

    /// A handle that can cancel this ticket from another thread or task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
            waiter: Arc::clone(&self.waiter),
        }
    }

    /// Gives up the ticket.
    ///
    /// Returns `true` if the ticket was removed from the queue before a
    /// permit reached it. Returns `false` if it had already been granted (the
    /// permit goes back to the pool) or cancelled.
    pub fn cancel(mut self) -> bool {
        self.settled = true;
        self.shared.abandon(&self.waiter)
    }

    /// Blocks the calling thread until the ticket is granted, cancelled, or
    /// `deadline` passes.
    ///
    /// # Errors
    ///
    /// - [`BulkheadError::Timeout`] if the deadline passed while queued.
    /// - [`BulkheadError::Cancelled`] if a [`CancelHandle`] cancelled it.
    pub fn wait_blocking(mut self, deadline: Option<Instant>) -> Result<Permit> {
        let waiter = Arc::clone(&self.waiter);
        let mut slot = waiter.slot();
        loop {
            if slot.state != WaitState::Waiting {
                drop(slot);
                return self.claim();
            }

            slot = match deadline {
                None => waiter
                    .ready
                    .wait(slot)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        drop(slot);
                        return self.expire();
                    }
                    waiter
                        .ready
                        .wait_timeout(slot, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Waits asynchronously until the ticket is granted, cancelled, or
    /// `deadline` passes.
    ///
    /// Dropping the returned future cancels the ticket. A `Some` deadline is
    /// armed as a tokio timer the first time the future has to wait, so it
    /// must be polled on a runtime with the time driver enabled.
    pub fn wait(self, deadline: Option<Instant>) -> Acquire {
        Acquire {
            ticket: self,
            deadline,
            sleep: None,
        }
    }

    // Converts a resolved ticket into its outcome.
    fn claim(&mut self) -> Result<Permit> {
        self.settled = true;
        if self.waiter.take_grant() {
            Ok(Permit::new(Arc::clone(&self.shared)))
        } else {
            Err(BulkheadError::Cancelled)
        }
    }

    fn expire(&mut self) -> Result<Permit> {
        if self.shared.withdraw(&self.waiter, WaitState::Cancelled) {
            self.settled = true;
            return Err(BulkheadError::Timeout);
        }
        // Granted or cancelled just before the deadline.
        self.claim()
    }
}

impl Drop for QueueTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.shared.abandon(&self.waiter);
        }
    }
}

impl fmt::Debug for QueueTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueTicket")
            .field("id", &self.waiter.id)
            .field("state", &self.waiter.state())
            .finish()
    }
}

/// Cancels a queued caller from outside, e.g. from a timeout policy.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
    waiter: Arc<Waiter>,
}

impl CancelHandle {
    /// Removes the waiter from the queue.
    ///
    /// Returns `true` if the waiter was still queued; it will never be
    /// granted and its wait resolves to [`BulkheadError::Cancelled`]. Returns
    /// `false` if it had already been granted or had left the queue.
    pub fn cancel(&self) -> bool {
        self.shared.withdraw(&self.waiter, WaitState::Cancelled)
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("id", &self.waiter.id)
            .finish()
    }
}

/// Future returned by [`QueueTicket::wait`].
///
/// Panics when it has to arm its deadline outside a tokio runtime with the
/// time driver enabled.
#[must_use = "futures do nothing unless polled"]
pub struct Acquire {
    ticket: QueueTicket,
    deadline: Option<Instant>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Future for Acquire {
    type Output = Result<Permit>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.ticket.settled {
            return Poll::Ready(Err(BulkheadError::Cancelled));
        }

        {
            let mut slot = this.ticket.waiter.slot();
            if slot.state != WaitState::Waiting {
                drop(slot);
                return Poll::Ready(this.ticket.claim());
            }
            let stale = slot
                .waker
                .as_ref()
                .is_none_or(|waker| !waker.will_wake(cx.waker()));
            if stale {
                slot.waker = Some(cx.waker().clone());
            }
        }

        if let Some(deadline) = this.deadline {
            let sleep = this.sleep.get_or_insert_with(|| {
                Box::pin(tokio::time::sleep_until(tokio::time::Instant::from_std(
                    deadline,
                )))
            });
            if sleep.as_mut().poll(cx).is_ready() {
                return Poll::Ready(this.ticket.expire());
            }
        }

        Poll::Pending
    }
}

impl fmt::Debug for Acquire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquire")
            .field("ticket", &self.ticket)
            .field("deadline", &self.deadline)
            .finish()
    }
}
