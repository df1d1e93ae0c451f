//! Door simulation for testing.
//!
//! Toggles the door through the same path as the HTTP test endpoint, so
//! stream clients see exactly what a real sensor would produce.

use crate::relay::Dispatcher;
use crate::state::DoorUpdate;
use log::info;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Spawn a task that flips the door state every `period`.
///
/// # Returns
///
/// A `JoinHandle` for the task; it exits once `shutdown` is cancelled.
pub fn run_door_simulation(
    dispatcher: Arc<Dispatcher>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let open = !dispatcher.current().is_open;
                    let state = dispatcher.apply(DoorUpdate::forced(open, None));
                    info!("[Sim] Door toggled to: {}", state.status);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::DEFAULT_STREAM_BUFFER;
    use crate::state::StateStore;

    #[tokio::test(start_paused = true)]
    async fn test_simulation_toggles_door() {
        let dispatcher = Arc::new(Dispatcher::new(StateStore::new(), DEFAULT_STREAM_BUFFER));
        let shutdown = CancellationToken::new();
        let mut sub = dispatcher.subscribe();
        let _ = sub.recv().await;

        let task = run_door_simulation(dispatcher.clone(), Duration::from_secs(30), shutdown.clone());

        let first: serde_json::Value = serde_json::from_str(&sub.recv().await.unwrap()).unwrap();
        assert_eq!(first["status"], "DETECTED");
        let second: serde_json::Value = serde_json::from_str(&sub.recv().await.unwrap()).unwrap();
        assert_eq!(second["status"], "CLEAR");

        shutdown.cancel();
        task.await.unwrap();
    }
}
