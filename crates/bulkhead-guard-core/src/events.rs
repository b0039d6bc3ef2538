//! Listener plumbing shared by every bulkhead.
//!
//! A bulkhead reports each admission decision it takes as an event value
//! implementing [`ObservedEvent`]. Interested parties register an
//! [`EventListener`] (or a bare closure through [`EventListeners::add_fn`])
//! and get called back synchronously.
//!
//! # Delivery rules
//!
//! - Listeners run on the thread that caused the event, in the order they
//!   were registered. There is no buffering and no background task.
//! - The bulkhead publishes after it has released its internal lock, so a
//!   listener may call back into the same bulkhead without deadlocking.
//! - A panic inside a listener is swallowed at the listener boundary. The
//!   next listener still runs and the admission decision is unaffected.
//! - Listeners should be quick. A slow listener delays the caller that
//!   triggered the event, including the caller that released a permit.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// What every published event carries, whatever its variant.
pub trait ObservedEvent: Send + Sync + fmt::Debug {
    /// Short snake_case tag such as `"call_rejected"`, usable as a metric label.
    fn event_type(&self) -> &'static str;

    fn timestamp(&self) -> Instant;

    /// The `name` given to the bulkhead at construction.
    fn bulkhead_name(&self) -> &str;
}

/// A callback that observes events of one type.
///
/// Implementations are shared between threads and must not assume they
/// are called from any particular one.
pub trait EventListener<E: ObservedEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// The listener list owned by one bulkhead configuration.
///
/// A clone shares the registered callbacks; events published through either
/// copy reach the same listeners. The event type itself does not need to be
/// `Clone`.
pub struct EventListeners<E: ObservedEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ObservedEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers `listener` after any already present.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Registers a closure. Shorthand for `add(FnListener::new(f))`.
    pub fn add_fn<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
        E: 'static,
    {
        self.add(FnListener::new(f));
    }

    /// Calls every listener with `event`, oldest registration first.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            // A faulty listener must not take the permit accounting down with it.
            let _ = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ObservedEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: ObservedEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ObservedEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Closure adapter behind [`EventListeners::add_fn`].
pub struct FnListener<E, F> {
    f: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ObservedEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
