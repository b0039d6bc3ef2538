//! Stress tests for the bulkhead
//!
//! These tests push the bulkhead to its limits to validate behavior under extreme conditions.
//! They are marked with `#[ignore]` and must be run explicitly:
//!
//! ```bash
//! # Run all stress tests
//! cargo test --test stress -- --ignored
//!
//! # Run with output
//! cargo test --test stress -- --ignored --nocapture
//! ```
//!
//! ## What We Test
//!
//! - **High volume**: Hundreds of thousands of admissions
//! - **High concurrency**: Thousands of concurrent callers, blocking and async
//! - **State consistency**: Permit and queue accounting return to idle
//! - **Cancellation churn**: Waiters leaving the queue while permits move


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Utility: Track peak concurrent operations
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn enter(&self) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Enters and returns a guard that exits on drop, so a cancelled
    /// future still leaves the count balanced.
    pub fn track(self: &Arc<Self>) -> Exit {
        self.enter();
        Exit(Arc::clone(self))
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

/// Exits its tracker when dropped.
pub struct Exit(Arc<ConcurrencyTracker>);

impl Drop for Exit {
    fn drop(&mut self) {
        self.0.exit();
    }
}
