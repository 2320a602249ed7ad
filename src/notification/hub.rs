//! Publish/subscribe hub for lifecycle events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::notification::types::LifecycleEvent;

type Listener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;
type Listeners = DashMap<u64, Listener>;

/// Fan-out of lifecycle events to subscribed listeners.
#[derive(Clone, Default)]
pub struct NotificationHub {
    listeners: Arc<Listeners>,
    next_id: Arc<AtomicU64>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned handle is
    /// unsubscribed or dropped.
    #[must_use = "dropping the handle unsubscribes the listener"]
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionHandle
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, Arc::new(listener));
        SubscriptionHandle {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Deliver `event` to every listener registered when the call starts.
    ///
    /// The listener set is snapshotted first, so listeners may subscribe or
    /// unsubscribe from inside a callback.
    pub fn publish(&self, event: &LifecycleEvent) {
        let mut snapshot: Vec<(u64, Listener)> = self
            .listeners
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        snapshot.sort_by_key(|(id, _)| *id);

        tracing::trace!(unit = %event.unit, kind = %event.kind, listeners = snapshot.len(), "Publishing lifecycle event");
        for (_, listener) in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Drop every listener. Outstanding handles become inert.
    pub fn clear(&self) {
        self.listeners.clear();
    }
}

/// Registration of one listener on a [`NotificationHub`].
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: u64,
    listeners: Weak<Listeners>,
}

impl SubscriptionHandle {
    pub fn unsubscribe(self) {
        drop(self);
    }

    pub fn is_active(&self) -> bool {
        self.listeners
            .upgrade()
            .map(|listeners| listeners.contains_key(&self.id))
            .unwrap_or(false)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(&self.id);
        }
    }
}
