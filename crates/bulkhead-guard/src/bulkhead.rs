//! The execution guard.

use crate::config::{BulkheadConfig, BulkheadConfigBuilder};
use crate::error::{BulkheadError, Result};
use crate::events::{BulkheadEvent, RejectionReason};
use crate::execution::{Execution, InFlight, Reservation};
use crate::layer::BulkheadLayer;
use crate::observer::{BulkheadSnapshot, Counters};
use crate::outcome::{ExecutionOutcome, OutcomeKind};
use crate::pool::PermitPool;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Bounds how many calls to a protected operation run at once.
///
/// One `Bulkhead` guards one operation; clone it to share it between every
/// caller of that operation. Calls run through [`run`](Self::run),
/// [`run_blocking`](Self::run_blocking) or, for operations that return a
/// deferred result, [`submit`](Self::submit) / [`spawn`](Self::spawn).
///
/// Nested calls through the same bulkhead are independent requests. With
/// one permit, a call that re-enters its own bulkhead is rejected, or waits
/// on itself until its wait bound expires.
#[derive(Clone)]
pub struct Bulkhead {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    config: BulkheadConfig,
    pool: PermitPool,
    counters: Counters,
}

impl Bulkhead {
    /// Creates a bulkhead with `capacity` permits and an optional waiting
    /// area of `queue_capacity` callers.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, queue_capacity: Option<usize>) -> Self {
        Self::builder()
            .max_concurrent_calls(capacity)
            .max_queued_calls(queue_capacity)
            .build()
    }

    /// Creates a new builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use bulkhead_guard::Bulkhead;
    /// use std::time::Duration;
    ///
    /// let bulkhead = Bulkhead::builder()
    ///     .max_concurrent_calls(10)
    ///     .max_queued_calls(Some(50))
    ///     .max_wait_duration(Some(Duration::from_secs(5)))
    ///     .name("inventory")
    ///     .build();
    /// assert_eq!(bulkhead.name(), "inventory");
    /// ```
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    pub(crate) fn from_config(config: BulkheadConfig) -> Self {
        #[cfg(feature = "metrics")]
        describe_metrics();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            bulkhead = %config.name,
            max_concurrent_calls = config.max_concurrent_calls,
            max_queued_calls = ?config.max_queued_calls,
            "bulkhead created"
        );

        let pool = PermitPool::from_parts(config.max_concurrent_calls, config.max_queued_calls);
        Self {
            inner: Arc::new(Inner {
                config,
                pool,
                counters: Counters::default(),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Inner {
        &self.inner
    }

    /// Name of this bulkhead.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// The configuration this bulkhead was built with.
    pub fn config(&self) -> &BulkheadConfig {
        &self.inner.config
    }

    /// The underlying permit pool.
    pub fn pool(&self) -> &PermitPool {
        &self.inner.pool
    }

    /// Calls currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.inner.pool.in_flight()
    }

    /// Calls currently waiting for a permit.
    pub fn queued(&self) -> usize {
        self.inner.pool.queued()
    }

    /// Reads the current usage and outcome counters without blocking.
    pub fn snapshot(&self) -> BulkheadSnapshot {
        BulkheadSnapshot::new(
            self.inner.config.max_concurrent_calls,
            self.inner.config.max_queued_calls,
            self.inner.pool.in_flight(),
            self.inner.pool.queued(),
            &self.inner.counters,
        )
    }

    /// A tower layer whose services all share this bulkhead.
    pub fn layer(&self) -> BulkheadLayer {
        BulkheadLayer::new(self.clone())
    }

    /// Requests a permit, joining the waiting area if none is free.
    ///
    /// # Errors
    ///
    /// Fails immediately with [`BulkheadError::BulkheadFull`] or
    /// [`BulkheadError::QueueFull`]; such calls are counted as rejected.
    pub fn reserve(&self) -> Result<Reservation> {
        let started = Instant::now();
        match self.inner.pool.admit() {
            Ok((ticket, queue_depth)) => {
                if let Some(depth) = queue_depth {
                    self.inner.on_queued(depth);
                }
                Ok(Reservation::new(self.clone(), ticket, started))
            }
            Err(err) => {
                self.inner.on_rejected(&err);
                Err(err)
            }
        }
    }

    /// Takes a permit only if one is free right now, bypassing the queue.
    pub fn try_enter(&self) -> Result<Execution> {
        match self.inner.pool.try_acquire() {
            Some(permit) => Ok(Execution::start(self.clone(), permit, Duration::ZERO)),
            None => {
                let err = BulkheadError::BulkheadFull {
                    max_concurrent_calls: self.inner.config.max_concurrent_calls,
                };
                self.inner.on_rejected(&err);
                Err(err)
            }
        }
    }

    /// Takes a permit, waiting in the queue (asynchronously) if the
    /// bulkhead has one.
    ///
    /// When `max_wait_duration` is set and the caller has to wait, the
    /// deadline is a [`tokio::time::Sleep`]: the future must then be polled
    /// inside a tokio runtime with the time driver enabled, or it panics.
    /// Use [`Bulkhead::enter_blocking`] outside a runtime.
    pub async fn enter(&self) -> Result<Execution> {
        self.reserve()?.wait().await
    }

    /// Takes a permit, blocking the current thread in the queue if the
    /// bulkhead has one.
    pub fn enter_blocking(&self) -> Result<Execution> {
        self.reserve()?.wait_blocking()
    }

    /// Runs a synchronous operation under a permit.
    ///
    /// The calling thread waits in the queue (if any); the permit is
    /// released when `operation` returns or unwinds.
    ///
    /// ```
    /// use bulkhead_guard::{Bulkhead, ExecutionOutcome};
    ///
    /// let bulkhead = Bulkhead::new(1, None);
    /// let outcome = bulkhead.run_blocking(|| Ok::<_, ()>(6 * 7));
    /// assert_eq!(outcome, ExecutionOutcome::Completed(42));
    /// ```
    pub fn run_blocking<F, T, E>(&self, operation: F) -> ExecutionOutcome<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let execution = match self.enter_blocking() {
            Ok(execution) => execution,
            Err(err) => return ExecutionOutcome::Rejected(err),
        };
        let result = operation();
        execution.complete(&result);
        ExecutionOutcome::from_result(result)
    }

    /// Runs an asynchronous operation under a permit.
    ///
    /// `operation` is only invoked once a permit is held; the permit is
    /// released when the future it returns resolves. Waiting for the permit
    /// has the same runtime requirement as [`Bulkhead::enter`].
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> ExecutionOutcome<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let execution = match self.enter().await {
            Ok(execution) => execution,
            Err(err) => return ExecutionOutcome::Rejected(err),
        };
        ExecutionOutcome::from_result(execution.guard(operation()).await)
    }

    /// Starts a deferred operation under a permit and hands back its result
    /// without waiting for it.
    ///
    /// `operation` is invoked as soon as a permit is held. The permit then
    /// travels with the returned [`InFlight`] and is released when the
    /// deferred result resolves, not when this method returns.
    ///
    /// Waiting for the permit has the same runtime requirement as
    /// [`Bulkhead::enter`].
    pub async fn submit<F, Fut, T, E>(&self, operation: F) -> Result<InFlight<Fut>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let execution = self.enter().await?;
        Ok(execution.guard(operation()))
    }

    /// Like [`submit`](Self::submit), but only if a permit is free right now.
    pub fn try_submit<F, Fut, T, E>(&self, operation: F) -> Result<InFlight<Fut>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let execution = self.try_enter()?;
        Ok(execution.guard(operation()))
    }

    /// Like [`submit`](Self::submit), blocking the calling thread in the
    /// queue instead of suspending a task.
    pub fn submit_blocking<F, Fut, T, E>(&self, operation: F) -> Result<InFlight<Fut>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let execution = self.enter_blocking()?;
        Ok(execution.guard(operation()))
    }

    /// Starts a deferred operation under a permit and drives it on the tokio
    /// runtime.
    ///
    /// The permit is held by the spawned task until the operation resolves.
    /// Must be called from within a tokio runtime.
    pub async fn spawn<F, Fut, T, E>(
        &self,
        operation: F,
    ) -> Result<JoinHandle<std::result::Result<T, E>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let in_flight = self.submit(operation).await?;
        Ok(tokio::spawn(in_flight))
    }
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.inner.config.name)
            .field("pool", &self.inner.pool)
            .finish()
    }
}

impl Inner {
    pub(crate) fn on_queued(&self, queue_depth: usize) {
        let name = &self.config.name;
        self.config.event_listeners.emit(&BulkheadEvent::CallQueued {
            pattern_name: name.clone(),
            timestamp: Instant::now(),
            queue_depth,
        });

        #[cfg(feature = "tracing")]
        tracing::trace!(bulkhead = %name, queue_depth, "bulkhead queued call");

        #[cfg(feature = "metrics")]
        gauge!("bulkhead_queue_depth", "bulkhead" => name.clone()).set(queue_depth as f64);
    }

    pub(crate) fn on_rejected(&self, err: &BulkheadError) {
        let kind = OutcomeKind::of_error(err);
        self.counters.record(kind);

        let reason = match kind {
            OutcomeKind::RejectedQueueFull => RejectionReason::QueueFull,
            _ => RejectionReason::Capacity,
        };
        let name = &self.config.name;
        self.config.event_listeners.emit(&BulkheadEvent::CallRejected {
            pattern_name: name.clone(),
            timestamp: Instant::now(),
            max_concurrent_calls: self.config.max_concurrent_calls,
            reason,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(bulkhead = %name, reason = reason.as_str(), "bulkhead rejected call");

        #[cfg(feature = "metrics")]
        counter!(
            "bulkhead_calls_rejected_total",
            "bulkhead" => name.clone(),
            "reason" => reason.as_str()
        )
        .increment(1);
    }

    pub(crate) fn on_cancelled(&self, err: &BulkheadError, waited: Duration) {
        self.counters.record(OutcomeKind::Cancelled);

        let timed_out = matches!(err, BulkheadError::Timeout);
        let name = &self.config.name;
        self.config.event_listeners.emit(&BulkheadEvent::CallCancelled {
            pattern_name: name.clone(),
            timestamp: Instant::now(),
            waited,
            timed_out,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            bulkhead = %name,
            timed_out,
            waited_ms = waited.as_millis() as u64,
            "bulkhead call left the queue without a permit"
        );

        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_cancelled_total", "bulkhead" => name.clone()).increment(1);
            gauge!("bulkhead_queue_depth", "bulkhead" => name.clone())
                .set(self.pool.queued() as f64);
        }
    }

    pub(crate) fn on_permitted(&self, waited: Duration) {
        let concurrent_calls = self.pool.in_flight();
        let name = &self.config.name;
        self.config.event_listeners.emit(&BulkheadEvent::CallPermitted {
            pattern_name: name.clone(),
            timestamp: Instant::now(),
            concurrent_calls,
            waited,
        });

        #[cfg(feature = "tracing")]
        tracing::trace!(bulkhead = %name, concurrent_calls, "bulkhead permitted call");

        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_permitted_total", "bulkhead" => name.clone()).increment(1);
            gauge!("bulkhead_concurrent_calls", "bulkhead" => name.clone())
                .set(concurrent_calls as f64);
            gauge!("bulkhead_queue_depth", "bulkhead" => name.clone())
                .set(self.pool.queued() as f64);
            histogram!("bulkhead_wait_duration_seconds", "bulkhead" => name.clone())
                .record(waited.as_secs_f64());
        }
    }

    pub(crate) fn on_finished(&self, succeeded: bool, duration: Duration) {
        let name = &self.config.name;
        let event = if succeeded {
            self.counters.record(OutcomeKind::Completed);
            BulkheadEvent::CallFinished {
                pattern_name: name.clone(),
                timestamp: Instant::now(),
                duration,
            }
        } else {
            self.counters.record(OutcomeKind::Failed);
            BulkheadEvent::CallFailed {
                pattern_name: name.clone(),
                timestamp: Instant::now(),
                duration,
            }
        };
        self.config.event_listeners.emit(&event);

        #[cfg(feature = "tracing")]
        tracing::trace!(
            bulkhead = %name,
            succeeded,
            duration_ms = duration.as_millis() as u64,
            "bulkhead call finished"
        );

        #[cfg(feature = "metrics")]
        {
            if succeeded {
                counter!("bulkhead_calls_finished_total", "bulkhead" => name.clone()).increment(1);
            } else {
                counter!("bulkhead_calls_failed_total", "bulkhead" => name.clone()).increment(1);
            }
            gauge!("bulkhead_concurrent_calls", "bulkhead" => name.clone())
                .set(self.pool.in_flight() as f64);
            histogram!("bulkhead_call_duration_seconds", "bulkhead" => name.clone())
                .record(duration.as_secs_f64());
        }
    }
}

#[cfg(feature = "metrics")]
fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "bulkhead_calls_permitted_total",
            "Total number of calls that obtained a bulkhead permit"
        );
        describe_counter!(
            "bulkhead_calls_rejected_total",
            "Total number of calls rejected by the bulkhead without waiting"
        );
        describe_counter!(
            "bulkhead_calls_cancelled_total",
            "Total number of queued calls that timed out or were cancelled"
        );
        describe_counter!(
            "bulkhead_calls_finished_total",
            "Total number of admitted calls that finished successfully"
        );
        describe_counter!(
            "bulkhead_calls_failed_total",
            "Total number of admitted calls that failed"
        );
        describe_gauge!(
            "bulkhead_concurrent_calls",
            "Current number of calls holding a permit"
        );
        describe_gauge!(
            "bulkhead_queue_depth",
            "Current number of calls waiting for a permit"
        );
        describe_histogram!(
            "bulkhead_wait_duration_seconds",
            "Time spent waiting to obtain a permit"
        );
        describe_histogram!(
            "bulkhead_call_duration_seconds",
            "Time a permit was held"
        );
    });
}
