//! State-broadcast relay.
//!
//! Bridges door updates to any number of live-stream subscribers:
//! the [`Dispatcher`] applies an update to the state store and fans the new
//! value out through the [`SubscriberRegistry`]. Each HTTP stream holds a
//! [`Subscription`] that unregisters itself when dropped.

pub mod dispatcher;
pub mod registry;
pub mod subscription;

pub use dispatcher::{DEFAULT_STREAM_BUFFER, Dispatcher};
pub use registry::{DeliveryError, EventPayload, SubscriberHandle, SubscriberRegistry};
pub use subscription::Subscription;
