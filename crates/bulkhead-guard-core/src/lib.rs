//! Core infrastructure for bulkhead-guard.
//!
//! This crate holds the pieces that are not specific to permit accounting:
//! - The event system used to observe admission decisions
//! - [`CallError`], the caller-facing error that combines admission failures
//!   with the protected operation's own error

pub mod error;
pub mod events;

pub use error::CallError;
pub use events::{EventListener, EventListeners, FnListener, ObservedEvent};
