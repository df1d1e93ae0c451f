//! Door state management.
//!
//! This module owns the canonical door state. It is updated from the MQTT
//! ingest, the HTTP write endpoints and the simulation task, and read by the
//! HTTP layer and the broadcast dispatcher.

pub mod door_state;
pub mod store;

pub use door_state::{
    ConnectionPhase, DoorState, DoorUpdate, STATUS_CLEAR, STATUS_DETECTED, StreamEvent,
};
pub use store::StateStore;
