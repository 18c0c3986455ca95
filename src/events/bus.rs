//! In-memory publish/subscribe bus.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

use crate::events::DomainEvent;

/// Stable handle identifying one subscription, returned by
/// [`InMemoryEventBus::subscribe`] and consumed by
/// [`InMemoryEventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

/// Process-wide typed publish/subscribe registry, keyed by the stable
/// lowercase event-type name.
///
/// Dispatch is synchronous on the publishing task, in registration order.
/// Handlers must therefore be short and non-blocking; long work (rendering,
/// export writes) belongs on a task the handler spawns itself.
///
/// The subscription table is snapshotted before iteration, so subscribing or
/// unsubscribing from within a handler never affects the publication in
/// flight. A panicking handler is caught and logged and does not prevent the
/// remaining handlers from running.
#[derive(Default)]
pub struct InMemoryEventBus {
    subscribers: Mutex<HashMap<String, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl InMemoryEventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event_type` and return its subscription handle.
    ///
    /// Handlers for the same event type are invoked in registration order.
    pub fn subscribe<F>(&self, event_type: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .entry(event_type.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove the subscription identified by `id`; no-op if absent.
    pub fn unsubscribe(&self, event_type: &str, id: SubscriptionId) {
        let mut table = self.subscribers.lock();
        if let Some(handlers) = table.get_mut(event_type) {
            handlers.retain(|(handler_id, _)| *handler_id != id);
            if handlers.is_empty() {
                table.remove(event_type);
            }
        }
    }

    /// Drop every handler registered for `event_type`.
    pub fn clear_subscribers(&self, event_type: &str) {
        self.subscribers.lock().remove(event_type);
    }

    /// Number of handlers currently registered for `event_type`.
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscribers
            .lock()
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every current subscriber of its type,
    /// synchronously, in registration order.
    pub fn publish(&self, event: &DomainEvent) {
        let snapshot: Vec<Handler> = {
            let table = self.subscribers.lock();
            table
                .get(event.event_type())
                .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        for handler in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
                error!(
                    event_type = event.event_type(),
                    "event subscriber panicked: {}",
                    panic_message(&panic)
                );
            }
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
