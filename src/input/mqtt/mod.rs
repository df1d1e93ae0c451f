//! MQTT input source for the door sensor.
//!
//! This module provides the MQTT client and the ingest adapter that turns
//! messages on the door topic into relay updates.

mod client;
mod ingest;

pub use client::{MqttClient, MqttEvent, MqttMessage, decode_payload};
pub use ingest::{DoorIngest, ingest};
