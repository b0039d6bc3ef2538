//! Fixed-capacity permit pool.
//!
//! The permit count and the waiting area live behind one mutex, so
//! check-and-take, enqueue, grant and cancel are a single critical section
//! each. Waiting never happens while that mutex is held: blocked threads park
//! on their own condvar and suspended tasks on their own waker (see
//! [`crate::queue`]).
//!
//! A released permit is handed straight to the oldest waiter when there is
//! one, so the free count only grows when nobody is queued. That keeps
//! [`PermitPool::try_acquire`] callers from overtaking queued callers.

use crate::error::{BulkheadError, Result};
use crate::queue::{QueueGate, QueueTicket, WaitState, Waiter};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

pub(crate) struct Shared {
    capacity: usize,
    queue_capacity: Option<usize>,
    state: Mutex<PoolState>,
    // Mirrors for lock-free observation; only written while `state` is locked.
    in_flight: AtomicUsize,
    queued: AtomicUsize,
    next_waiter: AtomicU64,
}

pub(crate) struct PoolState {
    available: usize,
    gate: Option<QueueGate>,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns one outstanding permit, handing it to the oldest waiter if any.
    pub(crate) fn release_locked(&self, state: &mut PoolState) {
        assert!(
            state.available < self.capacity,
            "permit released without a matching acquire ({} of {} permits already free)",
            state.available,
            self.capacity
        );

        if let Some(waiter) = state.gate.as_mut().and_then(QueueGate::pop_front) {
            self.queued.fetch_sub(1, Ordering::Relaxed);
            waiter.resolve(WaitState::Granted);
            return;
        }

        state.available += 1;
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn release_one(&self) {
        let mut state = self.lock();
        self.release_locked(&mut state);
    }

    /// Removes `waiter` from the queue and resolves it to `outcome`.
    ///
    /// Returns `false` if the waiter had already left the queue, i.e. it was
    /// granted or cancelled first.
    pub(crate) fn withdraw(&self, waiter: &Waiter, outcome: WaitState) -> bool {
        let mut state = self.lock();
        let removed = state
            .gate
            .as_mut()
            .is_some_and(|gate| gate.remove(waiter.id()));
        if removed {
            self.queued.fetch_sub(1, Ordering::Relaxed);
            waiter.resolve(outcome);
        }
        removed
    }

    /// Drops a ticket's claim: leaves the queue, or returns a grant nobody
    /// will consume.
    pub(crate) fn abandon(&self, waiter: &Waiter) -> bool {
        let mut state = self.lock();
        let removed = state
            .gate
            .as_mut()
            .is_some_and(|gate| gate.remove(waiter.id()));
        if removed {
            self.queued.fetch_sub(1, Ordering::Relaxed);
            waiter.resolve(WaitState::Cancelled);
            return true;
        }

        if waiter.take_grant() {
            self.release_locked(&mut state);
        }
        false
    }
}

/// A fixed-capacity counting admission primitive.
///
/// Cloning yields another handle to the same pool.
///
/// # Example
///
/// ```rust
/// use bulkhead_guard::PermitPool;
///
/// let pool = PermitPool::new(2);
/// let a = pool.try_acquire().unwrap();
/// let _b = pool.try_acquire().unwrap();
/// assert!(pool.try_acquire().is_none());
///
/// pool.release(a);
/// assert_eq!(pool.available_permits(), 1);
/// ```
#[derive(Clone)]
pub struct PermitPool {
    shared: Arc<Shared>,
}

impl PermitPool {
    /// Creates a pool without a waiting area: an exhausted pool rejects.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self::from_parts(capacity, None)
    }

    /// Creates a pool whose exhausted callers may wait, at most
    /// `queue_capacity` at a time, in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_queue(capacity: usize, queue_capacity: usize) -> Self {
        Self::from_parts(capacity, Some(queue_capacity))
    }

    pub(crate) fn from_parts(capacity: usize, queue_capacity: Option<usize>) -> Self {
        assert!(capacity > 0, "permit pool capacity must be at least 1");
        Self {
            shared: Arc::new(Shared {
                capacity,
                queue_capacity,
                state: Mutex::new(PoolState {
                    available: capacity,
                    gate: queue_capacity.map(QueueGate::new),
                }),
                in_flight: AtomicUsize::new(0),
                queued: AtomicUsize::new(0),
                next_waiter: AtomicU64::new(0),
            }),
        }
    }

    /// Maximum number of permits outstanding at once.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Size of the waiting area, or `None` for a capacity-only pool.
    pub fn queue_capacity(&self) -> Option<usize> {
        self.shared.queue_capacity
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Relaxed)
    }

    /// Callers currently waiting.
    pub fn queued(&self) -> usize {
        self.shared.queued.load(Ordering::Relaxed)
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.capacity().saturating_sub(self.in_flight())
    }

    /// Takes a permit if one is free, never waiting.
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut state = self.shared.lock();
        if state.available == 0 {
            return None;
        }
        state.available -= 1;
        self.shared.in_flight.fetch_add(1, Ordering::Relaxed);
        Some(Permit::new(Arc::clone(&self.shared)))
    }

    /// Asks for a permit, joining the waiting area if none is free.
    ///
    /// The returned ticket is already granted when a permit was free.
    ///
    /// # Errors
    ///
    /// - [`BulkheadError::BulkheadFull`] if no permit is free and the pool has
    ///   no waiting area.
    /// - [`BulkheadError::QueueFull`] if the waiting area is full; the caller
    ///   is never added.
    pub fn enqueue(&self) -> Result<QueueTicket> {
        self.admit().map(|(ticket, _)| ticket)
    }

    /// Like [`enqueue`](Self::enqueue), also reporting the queue depth the
    /// caller joined at (`None` when granted immediately).
    pub(crate) fn admit(&self) -> Result<(QueueTicket, Option<usize>)> {
        let mut state = self.shared.lock();
        if state.available > 0 {
            state.available -= 1;
            self.shared.in_flight.fetch_add(1, Ordering::Relaxed);
            let waiter = Waiter::new(self.next_id(), WaitState::Granted);
            let ticket = QueueTicket::new(Arc::clone(&self.shared), Arc::new(waiter));
            return Ok((ticket, None));
        }

        let Some(gate) = state.gate.as_mut() else {
            return Err(BulkheadError::BulkheadFull {
                max_concurrent_calls: self.shared.capacity,
            });
        };

        let waiter = Arc::new(Waiter::new(self.next_id(), WaitState::Waiting));
        if !gate.try_push(Arc::clone(&waiter)) {
            return Err(BulkheadError::QueueFull {
                max_queued_calls: gate.capacity(),
            });
        }
        let depth = self.shared.queued.fetch_add(1, Ordering::Relaxed) + 1;
        Ok((QueueTicket::new(Arc::clone(&self.shared), waiter), Some(depth)))
    }

    /// Takes a permit, blocking the calling thread in the waiting area until
    /// one is granted or `deadline` passes.
    ///
    /// Other threads keep acquiring and releasing while this one waits.
    pub fn acquire_blocking(&self, deadline: Option<Instant>) -> Result<Permit> {
        self.enqueue()?.wait_blocking(deadline)
    }

    /// Takes a permit, suspending the calling task in the waiting area until
    /// one is granted or `deadline` passes.
    ///
    /// With a deadline this needs a tokio runtime with the time driver
    /// enabled; see [`QueueTicket::wait`].
    pub async fn acquire(&self, deadline: Option<Instant>) -> Result<Permit> {
        self.enqueue()?.wait(deadline).await
    }

    /// Returns `permit` to this pool.
    ///
    /// Dropping a permit does the same; this form also checks ownership.
    ///
    /// # Panics
    ///
    /// Panics if `permit` was issued by a different pool.
    pub fn release(&self, permit: Permit) {
        assert!(
            Arc::ptr_eq(&self.shared, &permit.shared),
            "permit released into a pool that did not issue it"
        );
        drop(permit);
    }

    fn next_id(&self) -> u64 {
        self.shared.next_waiter.fetch_add(1, Ordering::Relaxed)
    }
}

impl fmt::Debug for PermitPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermitPool")
            .field("capacity", &self.capacity())
            .field("queue_capacity", &self.queue_capacity())
            .field("in_flight", &self.in_flight())
            .field("queued", &self.queued())
            .finish()
    }
}

/// The right to run one operation.
///
/// Released exactly once: when dropped, or via [`PermitPool::release`].
#[must_use = "dropping a permit releases it immediately"]
pub struct Permit {
    shared: Arc<Shared>,
}

impl Permit {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.shared.release_one();
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("capacity", &self.shared.capacity)
            .finish()
    }
}
