//! Simulated door input for development and demos.

mod door;

pub use door::run_door_simulation;
