//! Door relay library.
//!
//! Relays door sensor events from an MQTT topic to web clients. The current
//! state is served over REST and every change is pushed to server-sent event
//! subscribers.
//!
//! Data flow: MQTT ingest → [`state::StateStore`] → [`relay::Dispatcher`] →
//! [`relay::SubscriberRegistry`] → each connected stream.

pub mod config;
pub mod error;
pub mod http;
pub mod input;
pub mod relay;
pub mod state;
