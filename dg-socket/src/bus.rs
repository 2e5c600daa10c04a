//! Name-keyed publish/subscribe bus.
//!
//! Subscribers register a callback under an event name; `publish` invokes
//! every callback registered under that name. Alongside the callback
//! registry, every published event is broadcast as a typed `DeviceEvent`
//! so stream consumers (a live camera view, a logger) can follow all
//! traffic without registering per name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::events::DeviceEvent;

/// Callback invoked with the payload of a published event.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Entry {
    id: SubscriptionId,
    callback: Callback,
    once: bool,
}

struct BusInner {
    registry: Mutex<HashMap<String, Vec<Entry>>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<DeviceEvent>,
}

/// Publish/subscribe registry shared by the connection, the router and the
/// correlator. Cloning is cheap and every clone sees the same registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus whose typed stream buffers `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(BusInner {
                registry: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                sender,
            }),
        }
    }

    fn register(&self, name: &str, callback: Callback, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .registry
            .lock()
            .entry(name.to_string())
            .or_default()
            .push(Entry { id, callback, once });
        trace!("bus: subscribed {id:?} to {name} (once={once})");
        id
    }

    /// Register `callback` under `name` until it is unsubscribed.
    pub fn subscribe<F>(&self, name: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.register(name, Arc::new(callback), false)
    }

    /// Register `callback` for the next event under `name` only.
    ///
    /// The registration is removed before the callback runs, so a callback
    /// can never fire twice even if the same event is published from inside it.
    pub fn subscribe_once<F>(&self, name: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.register(name, Arc::new(callback), true)
    }

    /// Remove one registration. Returns false if it was not registered.
    pub fn unsubscribe(&self, name: &str, id: SubscriptionId) -> bool {
        let mut registry = self.inner.registry.lock();
        let Some(list) = registry.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| e.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            registry.remove(name);
        }
        removed
    }

    /// Invoke every callback registered under `name` with `payload`, then
    /// broadcast the event on the typed stream.
    ///
    /// Callbacks run over a snapshot taken before the first one is invoked;
    /// the registry lock is not held while they run.
    pub fn publish(&self, name: &str, payload: &Value) {
        let snapshot: Vec<Callback> = {
            let mut registry = self.inner.registry.lock();
            match registry.get_mut(name) {
                Some(list) => {
                    let snapshot = list.iter().map(|e| Arc::clone(&e.callback)).collect();
                    list.retain(|e| !e.once);
                    if list.is_empty() {
                        registry.remove(name);
                    }
                    snapshot
                }
                None => Vec::new(),
            }
        };

        debug!("bus: {name} -> {} callback(s)", snapshot.len());
        for callback in &snapshot {
            callback(payload);
        }

        if self.inner.sender.receiver_count() > 0 {
            let _ = self.inner.sender.send(DeviceEvent::new(name, payload.clone()));
        }
    }

    /// Receive every published event as a typed `DeviceEvent`.
    ///
    /// Slow consumers that fall behind get `RecvError::Lagged` and miss events.
    pub fn events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.inner.sender.subscribe()
    }

    /// Number of registrations under `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.inner
            .registry
            .lock()
            .get(name)
            .map_or(0, Vec::len)
    }
}

/// Registration that unsubscribes itself when dropped.
pub struct Subscription {
    bus: EventBus,
    name: String,
    id: SubscriptionId,
}

impl Subscription {
    pub fn new(bus: &EventBus, name: &str, id: SubscriptionId) -> Self {
        Self {
            bus: bus.clone(),
            name: name.to_string(),
            id,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.name, self.id);
    }
}
