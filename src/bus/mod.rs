//! Change-notification bus.
//!
//! Decouples the persistence client from whatever reacts to saved
//! records. The contract is deliberately small: handlers run
//! synchronously, in registration order, on the publishing thread; a
//! handler that panics is caught and logged so the rest still run. The
//! subscriber list is snapshotted before dispatch, so handlers may
//! subscribe, unsubscribe, or publish again without deadlocking;
//! registrations made mid-publish take effect from the next publish.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    topics: HashMap<String, Vec<(u64, Handler<T>)>>,
}

impl<T> Registry<T> {
    fn new() -> Self {
        Registry {
            next_id: 0,
            topics: HashMap::new(),
        }
    }
}

/// Synchronous publish/subscribe over one payload type.
pub struct EventBus<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        EventBus {
            registry: Arc::new(Mutex::new(Registry::new())),
        }
    }

    /// Register `handler` for `topic`. Handlers fire in registration
    /// order. The returned [`Subscription`] detaches it again; dropping
    /// the subscription leaves the handler registered.
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> Subscription<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .topics
            .entry(topic.clone())
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription {
            topic,
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `payload` to every current subscriber of `topic`, in
    /// registration order, on this thread. A panicking handler is
    /// caught and logged; the remaining handlers still run.
    pub fn publish(&self, topic: &str, payload: &T) {
        let handlers: Vec<(u64, Handler<T>)> = {
            let registry = self.lock();
            match registry.topics.get(topic) {
                Some(handlers) => handlers.clone(),
                None => return,
            }
        };
        for (id, handler) in handlers {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
                tracing::error!(
                    "subscriber {} for '{}' panicked; continuing with remaining subscribers",
                    id,
                    topic
                );
            }
        }
    }

    /// Number of live subscriptions for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().topics.get(topic).map_or(0, |h| h.len())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry<T>> {
        // handlers never run under this lock, so a poisoned registry is
        // still structurally sound
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        EventBus {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        EventBus::new()
    }
}

/// Handle to one registration on an [`EventBus`].
pub struct Subscription<T> {
    topic: String,
    id: u64,
    registry: Weak<Mutex<Registry<T>>>,
}

impl<T> Subscription<T> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Detach the handler. A no-op when the bus is already gone.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(handlers) = registry.topics.get_mut(&self.topic) {
                handlers.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
