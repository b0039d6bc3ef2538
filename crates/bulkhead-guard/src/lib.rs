//! Concurrency bulkhead for blocking and deferred operations.
//!
//! A [`Bulkhead`] bounds how many calls to one protected operation run at
//! the same time. Calls that find no free permit either fail fast or wait in
//! a bounded FIFO waiting area. Operations that return a deferred result keep
//! their permit until that result resolves, so the bound covers the real work
//! and not just the call that started it.
//!
//! Building blocks:
//!
//! - [`PermitPool`]: the counting permit pool and its FIFO waiting area.
//! - [`Bulkhead`]: wraps calls with acquire and release, records outcomes.
//! - [`BulkheadSnapshot`]: lock-free view of usage and outcome counters.
//! - [`BulkheadLayer`] / [`BulkheadService`]: the same guard as a tower layer.
//!
//! # Basic Example
//!
//! ```rust
//! use bulkhead_guard::{Bulkhead, OutcomeKind};
//!
//! // Three permits, no waiting area: a fourth concurrent call is rejected.
//! let bulkhead = Bulkhead::builder()
//!     .max_concurrent_calls(3)
//!     .name("pricing")
//!     .build();
//!
//! let outcome = bulkhead.run_blocking(|| Ok::<_, std::io::Error>("priced"));
//! assert_eq!(outcome.kind(), OutcomeKind::Completed);
//! assert_eq!(bulkhead.snapshot().completed, 1);
//! ```
//!
//! # Deferred Results
//!
//! The permit travels with the returned future and is released when it
//! resolves:
//!
//! ```rust
//! use bulkhead_guard::{Bulkhead, BulkheadError};
//!
//! # async fn example() -> Result<(), BulkheadError> {
//! let bulkhead = Bulkhead::new(1, None);
//!
//! let pending = bulkhead.submit(|| async { Ok::<_, ()>(42) }).await?;
//! assert_eq!(bulkhead.in_flight(), 1);
//!
//! // Still held: a second call is rejected.
//! assert!(bulkhead.try_enter().is_err());
//!
//! assert_eq!(pending.await, Ok(42));
//! assert_eq!(bulkhead.in_flight(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! # Waiting Area
//!
//! ```rust
//! use bulkhead_guard::Bulkhead;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let bulkhead = Bulkhead::builder()
//!     .max_concurrent_calls(5)
//!     .max_queued_calls(Some(20))
//!     .max_wait_duration(Some(Duration::from_secs(2)))
//!     .on_call_queued(|depth| println!("{} callers waiting", depth))
//!     .build();
//!
//! let outcome = bulkhead.run(|| async { Ok::<_, ()>(()) }).await;
//! assert!(outcome.was_admitted());
//! # }
//! ```
//!
//! # Tower Integration
//!
//! ```rust
//! use bulkhead_guard::{Bulkhead, BulkheadError};
//! use tower::ServiceBuilder;
//!
//! # async fn example() {
//! let bulkhead = Bulkhead::new(10, Some(100));
//!
//! let service = ServiceBuilder::new()
//!     .layer(bulkhead.layer())
//!     .service_fn(|req: String| async move { Ok::<_, BulkheadError>(req) });
//! # }
//! ```

pub mod bulkhead;
pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod layer;
pub mod observer;
pub mod outcome;
pub mod pool;
pub mod queue;
pub mod service;

pub use bulkhead::Bulkhead;
pub use bulkhead_guard_core::CallError;
pub use config::{BulkheadConfig, BulkheadConfigBuilder};
pub use error::{BulkheadError, Result};
pub use events::{BulkheadEvent, RejectionReason};
pub use execution::{Execution, InFlight, Reservation};
pub use layer::BulkheadLayer;
pub use observer::BulkheadSnapshot;
pub use outcome::{ExecutionOutcome, OutcomeKind};
pub use pool::{Permit, PermitPool};
pub use queue::{Acquire, CancelHandle, QueueTicket};
pub use service::BulkheadService;
