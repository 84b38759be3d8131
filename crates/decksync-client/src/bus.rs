//! Typed in-process publish/subscribe fan-out.
//!
//! One [`EventBus`] carries every session event. Each event is a marker type
//! implementing [`Event`], which pins the payload type to the event name at
//! compile time; subscribing to a name with the wrong payload type cannot be
//! expressed.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::warn;

/// A bus event: a marker type pairing a wire-level name with a payload type.
pub trait Event: 'static {
    /// Payload delivered to subscribers, by reference.
    type Payload: 'static;
    /// Wire-level event name.
    const NAME: &'static str;
}

struct Slot<P>(Box<dyn FnMut(&P) + Send>);

struct Entry {
    id: u64,
    callback: Box<dyn Any + Send>,
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<&'static str, Vec<Entry>>,
}

#[derive(Default)]
struct BusInner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

/// In-process publish/subscribe fan-out with typed payloads.
///
/// Callbacks for one event run in registration order. A panicking callback
/// is caught and logged without disturbing the others. Callbacks run under
/// the registry lock, so they must not subscribe, unsubscribe, or publish on
/// the same bus; hand work off to a channel instead.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for event `E`.
    ///
    /// The returned [`Subscription`] deregisters the callback when
    /// explicitly asked to or when dropped.
    pub fn subscribe<E: Event>(
        &self,
        callback: impl FnMut(&E::Payload) + Send + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let slot: Slot<E::Payload> = Slot(Box::new(callback));
        {
            let mut registry = self.inner.registry.lock();
            registry
                .subscribers
                .entry(E::NAME)
                .or_default()
                .push(Entry { id, callback: Box::new(slot) });
        }
        Subscription {
            bus: Arc::clone(&self.inner),
            event: E::NAME,
            id,
        }
    }

    /// Deliver `payload` to every callback registered for `E`, in
    /// registration order.
    pub fn publish<E: Event>(&self, payload: &E::Payload) {
        let mut registry = self.inner.registry.lock();
        let Some(entries) = registry.subscribers.get_mut(E::NAME) else {
            return;
        };
        for entry in &mut *entries {
            let Some(slot) = entry.callback.downcast_mut::<Slot<E::Payload>>() else {
                continue;
            };
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (slot.0)(payload))) {
                warn!(
                    event = E::NAME,
                    subscriber = entry.id,
                    panic = panic_message(panic.as_ref()),
                    "subscriber callback panicked"
                );
            }
        }
    }

    /// Number of callbacks currently registered for `E`.
    #[must_use]
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.inner
            .registry
            .lock()
            .subscribers
            .get(E::NAME)
            .map_or(0, Vec::len)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Handle for deregistering a callback registered with
/// [`EventBus::subscribe`].
///
/// Dropping the handle also unsubscribes, so callers that want the callback
/// to stay alive must hold on to it.
#[must_use = "dropping a Subscription immediately unsubscribes its callback"]
pub struct Subscription {
    bus: Arc<BusInner>,
    event: &'static str,
    id: u64,
}

impl Subscription {
    /// Deregister the callback. Safe to call more than once; once this
    /// returns the callback will never run again.
    pub fn unsubscribe(&self) {
        let mut registry = self.bus.registry.lock();
        if let Some(entries) = registry.subscribers.get_mut(self.event) {
            entries.retain(|entry| entry.id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
