//! Comprehensive tests for the bulkhead.
//!
//! Test organization:
//! - concurrency.rs: Capacity bound under concurrent callers
//! - queue.rs: Waiting area bound, FIFO order, wait timeouts
//! - deferred.rs: Permits held until deferred results resolve
//! - cancellation.rs: Cancelling queued callers
//! - observer.rs: Outcome counters and events
//! - service.rs: Tower layer and service composition
//! - config.rs: Configuration validation and nesting

mod cancellation;
mod config;
mod deferred;
mod queue;

use std::thread;
use std::time::{Duration, Instant};

/// Spins until `condition` holds, failing the test after `timeout`.
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in {:?}", timeout);
        thread::sleep(Duration::from_millis(1));
    }
}

/// Async counterpart of [`wait_until`].
pub(crate) async fn wait_until_async(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in {:?}", timeout);
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
