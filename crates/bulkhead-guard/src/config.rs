//! Configuration for the bulkhead.

use crate::bulkhead::Bulkhead;
use crate::events::{BulkheadEvent, RejectionReason};
use bulkhead_guard_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a bulkhead.
#[derive(Clone, Debug)]
pub struct BulkheadConfig {
    /// Maximum number of concurrently executing calls.
    pub(crate) max_concurrent_calls: usize,
    /// Size of the waiting area; `None` rejects as soon as the pool is empty.
    pub(crate) max_queued_calls: Option<usize>,
    /// Maximum time a queued call waits for a permit.
    pub(crate) max_wait_duration: Option<Duration>,
    /// Name of this bulkhead instance.
    pub(crate) name: String,
    /// Event listeners.
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    /// Maximum number of concurrently executing calls.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }

    /// Size of the waiting area, if any.
    pub fn max_queued_calls(&self) -> Option<usize> {
        self.max_queued_calls
    }

    /// Maximum time a queued call waits for a permit.
    pub fn max_wait_duration(&self) -> Option<Duration> {
        self.max_wait_duration
    }

    /// Name of this bulkhead instance.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`Bulkhead`].
pub struct BulkheadConfigBuilder {
    max_concurrent_calls: usize,
    max_queued_calls: Option<usize>,
    max_wait_duration: Option<Duration>,
    name: String,
    event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_concurrent_calls: 25,
            max_queued_calls: None,
            max_wait_duration: None,
            name: "bulkhead".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the maximum number of concurrent calls. Must be at least 1.
    ///
    /// Default: 25
    pub fn max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max;
        self
    }

    /// Sets the size of the waiting area.
    ///
    /// With `None`, a call that finds no free permit is rejected with
    /// [`BulkheadError::BulkheadFull`](crate::BulkheadError::BulkheadFull).
    /// With `Some(n)`, up to `n` such calls wait in arrival order and the next
    /// one is rejected with
    /// [`BulkheadError::QueueFull`](crate::BulkheadError::QueueFull);
    /// `Some(0)` therefore rejects every excess call as queue-full.
    ///
    /// Default: None
    pub fn max_queued_calls(mut self, max: Option<usize>) -> Self {
        self.max_queued_calls = max;
        self
    }

    /// Sets the maximum time a queued call waits for a permit.
    ///
    /// If `None`, queued calls wait until granted or cancelled. Once a call
    /// holds a permit no time limit applies to it.
    /// Default: None
    pub fn max_wait_duration(mut self, duration: Option<Duration>) -> Self {
        self.max_wait_duration = duration;
        self
    }

    /// Sets the name of this bulkhead instance.
    ///
    /// Default: "bulkhead"
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a call obtains a permit.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - Called with the number of calls in flight, this one
    /// included. The value is between 1 and `max_concurrent_calls`.
    ///
    /// # Example
    /// ```rust
    /// use bulkhead_guard::BulkheadConfig;
    ///
    /// let bulkhead = BulkheadConfig::builder()
    ///     .max_concurrent_calls(10)
    ///     .on_call_permitted(|in_flight| {
    ///         if in_flight >= 8 {
    ///             println!("approaching capacity: {} in flight", in_flight);
    ///         }
    ///     })
    ///     .build();
    /// # drop(bulkhead);
    /// ```
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallPermitted {
                concurrent_calls, ..
            } = event
            {
                f(*concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback when a call joins the waiting area.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - Called with the queue depth, this call included.
    pub fn on_call_queued<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallQueued { queue_depth, .. } = event {
                f(*queue_depth);
            }
        }));
        self
    }

    /// Registers a callback when a call is turned away without waiting.
    ///
    /// # Callback Signature
    /// `Fn(RejectionReason)` - Which limit was hit: the permit pool itself
    /// (no waiting area) or the waiting area.
    ///
    /// # Example
    /// ```rust
    /// use bulkhead_guard::{BulkheadConfig, RejectionReason};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let queue_full = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&queue_full);
    ///
    /// let bulkhead = BulkheadConfig::builder()
    ///     .max_concurrent_calls(4)
    ///     .max_queued_calls(Some(16))
    ///     .on_call_rejected(move |reason| {
    ///         if reason == RejectionReason::QueueFull {
    ///             counter.fetch_add(1, Ordering::SeqCst);
    ///         }
    ///     })
    ///     .build();
    /// # drop(bulkhead);
    /// ```
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(RejectionReason) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallRejected { reason, .. } = event {
                f(*reason);
            }
        }));
        self
    }

    /// Registers a callback when a queued call leaves without a permit.
    ///
    /// # Callback Signature
    /// `Fn(Duration, bool)` - Called with the time spent queued and whether
    /// the wait bound expired (`true`) or the call was cancelled (`false`).
    pub fn on_call_cancelled<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration, bool) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallCancelled {
                waited, timed_out, ..
            } = event
            {
                f(*waited, *timed_out);
            }
        }));
        self
    }

    /// Registers a callback when an admitted call completes successfully.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - Called with how long the permit was held. For a
    /// deferred operation this covers the deferred work, not just the call
    /// that started it.
    pub fn on_call_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallFinished { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback when an admitted call fails.
    ///
    /// Failure covers an `Err` result, a panic, and dropping an in-flight
    /// deferred call before it resolves.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - Called with how long the permit was held.
    pub fn on_call_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallFailed { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback for every event, whatever its type.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&BulkheadEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(f);
        self
    }

    /// Builds the bulkhead.
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrent_calls` is zero.
    pub fn build(self) -> Bulkhead {
        if self.max_concurrent_calls == 0 {
            panic!("max_concurrent_calls must be at least 1");
        }

        let config = BulkheadConfig {
            max_concurrent_calls: self.max_concurrent_calls,
            max_queued_calls: self.max_queued_calls,
            max_wait_duration: self.max_wait_duration,
            name: self.name,
            event_listeners: self.event_listeners,
        };
        Bulkhead::from_config(config)
    }
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
