//! Receiving end of one live-stream subscriber.

use super::registry::{EventPayload, SubscriberHandle, SubscriberRegistry};
use futures_util::Stream;
use log::debug;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Stream of serialized events for one client.
///
/// Dropping it (the HTTP response body going away when the client hangs up)
/// removes the subscriber from the registry. The stream ends on its own if
/// the dispatcher prunes the subscriber.
pub struct Subscription {
    handle: SubscriberHandle,
    receiver: mpsc::Receiver<EventPayload>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    pub(crate) fn new(
        handle: SubscriberHandle,
        receiver: mpsc::Receiver<EventPayload>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            handle,
            receiver,
            registry,
        }
    }

    pub fn handle(&self) -> SubscriberHandle {
        self.handle
    }

    /// Wait for the next event. `None` once the subscriber has been pruned.
    pub async fn recv(&mut self) -> Option<EventPayload> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = EventPayload;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.registry.unregister(self.handle) {
            debug!(
                "[Relay] Subscriber {} disconnected ({} remaining)",
                self.handle,
                self.registry.len()
            );
        }
    }
}
