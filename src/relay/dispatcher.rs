//! Broadcast dispatcher: applies door updates and fans them out.
//!
//! Every writer (MQTT ingest, HTTP write endpoints, simulation) goes through
//! [`Dispatcher::apply`], so a forced state and a real sensor message have
//! identical side effects.

use super::registry::{EventPayload, SubscriberRegistry};
use super::subscription::Subscription;
use crate::error::Result;
use crate::state::{ConnectionPhase, DoorState, DoorUpdate, StateStore, StreamEvent};
use log::{debug, error, info};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default per-subscriber buffer, in events.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Owns the state store and the subscriber registry.
///
/// `apply`, `publish_phase` and `subscribe` are serialized behind one lock:
/// subscribers see state changes in the order the store applied them, and a
/// new subscriber's snapshot is never older than the first event it receives.
pub struct Dispatcher {
    store: StateStore,
    registry: Arc<SubscriberRegistry>,
    order: Mutex<()>,
    stream_buffer: usize,
}

impl Dispatcher {
    pub fn new(store: StateStore, stream_buffer: usize) -> Self {
        Self {
            store,
            registry: Arc::new(SubscriberRegistry::new()),
            order: Mutex::new(()),
            stream_buffer: stream_buffer.max(1),
        }
    }

    /// Current door state.
    pub fn current(&self) -> DoorState {
        self.store.get()
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Replace the door state and broadcast the new value.
    pub fn apply(&self, update: DoorUpdate) -> DoorState {
        let _order = self.order.lock();
        let state = self.store.set(update);
        let delivered = self.broadcast(&StreamEvent::State(state.clone()));
        info!(
            "[Relay] Door {} ({}), broadcast to {} subscriber(s)",
            if state.is_open { "open" } else { "closed" },
            state.status,
            delivered
        );
        state
    }

    /// Tell stream clients about a connection phase. The stored state is
    /// left untouched.
    pub fn publish_phase(&self, phase: ConnectionPhase) {
        let _order = self.order.lock();
        let delivered = self.broadcast(&StreamEvent::phase(phase));
        debug!("[Relay] Phase {} sent to {} subscriber(s)", phase, delivered);
    }

    /// Register a new stream subscriber, primed with the current state.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.stream_buffer);
        let _order = self.order.lock();
        let snapshot = encode(&StreamEvent::State(self.store.get())).unwrap_or_else(|e| {
            error!("[Relay] Failed to serialize snapshot: {}", e);
            Arc::from("")
        });
        let handle = self.registry.register(tx, &snapshot);
        info!(
            "[Relay] Subscriber {} connected ({} total)",
            handle,
            self.registry.len()
        );
        Subscription::new(handle, rx, self.registry.clone())
    }

    // Returns the number of subscribers the event reached.
    fn broadcast(&self, event: &StreamEvent) -> usize {
        let payload = match encode(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("[Relay] Failed to serialize stream event: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        self.registry.for_each(|subscriber| match subscriber.deliver(&payload) {
            Ok(()) => delivered += 1,
            Err(e) => {
                debug!(
                    "[Relay] Dropping subscriber {} after failed write: {:?}",
                    subscriber.handle, e
                );
                self.registry.unregister(subscriber.handle);
            }
        });
        delivered
    }
}

fn encode(event: &StreamEvent) -> Result<EventPayload> {
    Ok(Arc::from(serde_json::to_string(event)?))
}
