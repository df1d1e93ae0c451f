//! Registry of connected live-stream subscribers.

use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Serialized event text pushed to one subscriber.
pub type EventPayload = Arc<str>;

/// Delivery channel of one subscriber.
pub type SubscriberChannel = mpsc::Sender<EventPayload>;

/// Opaque handle identifying a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(Uuid);

impl SubscriberHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a write to a subscriber channel failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The receiving side is gone (client disconnected).
    Closed,
    /// The client is not draining its buffer fast enough.
    Full,
}

/// A registered subscriber as seen during iteration.
#[derive(Clone)]
pub struct Subscriber {
    pub handle: SubscriberHandle,
    channel: SubscriberChannel,
}

impl Subscriber {
    /// Push one event without waiting.
    pub fn deliver(&self, payload: &EventPayload) -> Result<(), DeliveryError> {
        deliver(&self.channel, payload)
    }
}

fn deliver(channel: &SubscriberChannel, payload: &EventPayload) -> Result<(), DeliveryError> {
    channel.try_send(payload.clone()).map_err(|e| match e {
        TrySendError::Closed(_) => DeliveryError::Closed,
        TrySendError::Full(_) => DeliveryError::Full,
    })
}

/// Set of currently connected subscribers.
///
/// Iteration works on a snapshot, so subscribers may be added or removed
/// while a broadcast is running.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberHandle, SubscriberChannel>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber and hand it the current snapshot straight away.
    pub fn register(&self, channel: SubscriberChannel, snapshot: &EventPayload) -> SubscriberHandle {
        let handle = SubscriberHandle::new();
        if let Err(e) = deliver(&channel, snapshot) {
            debug!("[Relay] Initial snapshot to {} not delivered: {:?}", handle, e);
        }
        self.subscribers.write().insert(handle, channel);
        handle
    }

    /// Remove a subscriber. Unknown or already removed handles are ignored.
    ///
    /// Returns whether the handle was still registered.
    pub fn unregister(&self, handle: SubscriberHandle) -> bool {
        self.subscribers.write().remove(&handle).is_some()
    }

    /// Visit every subscriber registered at the time of the call.
    pub fn for_each(&self, mut f: impl FnMut(&Subscriber)) {
        let snapshot: Vec<Subscriber> = self
            .subscribers
            .read()
            .iter()
            .map(|(handle, channel)| Subscriber {
                handle: *handle,
                channel: channel.clone(),
            })
            .collect();

        for subscriber in &snapshot {
            f(subscriber);
        }
    }

    pub fn contains(&self, handle: SubscriberHandle) -> bool {
        self.subscribers.read().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}
