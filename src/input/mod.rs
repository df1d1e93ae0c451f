//! Input sources for the door relay.
//!
//! Current input sources:
//! - `mqtt`: the door sensor topic on an MQTT broker
//! - `simulation`: periodic door toggling for demos without a sensor

pub mod mqtt;
pub mod simulation;
