//! Door sensor ingest: turns broker messages into door updates.
//!
//! Provides a high-level API for wiring the MQTT topic into the relay
//! without exposing MQTT internals to main.rs.

use super::client::{MqttClient, MqttEvent, MqttMessage};
use crate::config::MqttConfig;
use crate::relay::Dispatcher;
use crate::state::{ConnectionPhase, DoorState, DoorUpdate};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Map a raw sensor payload onto a door update. See [`DoorUpdate::from_payload`].
pub fn ingest(payload: &str) -> DoorUpdate {
    DoorUpdate::from_payload(payload)
}

/// Broker ingest adapter for the single door topic.
pub struct DoorIngest {
    topic: String,
    dispatcher: Arc<Dispatcher>,
    connected: bool,
}

impl DoorIngest {
    pub fn new(topic: impl Into<String>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            topic: topic.into(),
            dispatcher,
            connected: false,
        }
    }

    /// Start the ingest.
    ///
    /// Spawns a background task that connects to the broker, subscribes to
    /// the door topic and feeds every message into the dispatcher until
    /// `shutdown` is cancelled.
    pub fn start(self, config: MqttConfig, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(config, shutdown).await;
        })
    }

    async fn run(mut self, config: MqttConfig, shutdown: CancellationToken) {
        info!(
            "[MQTT] Connecting to {}:{} as {}",
            config.broker_host, config.broker_port, config.client_id
        );

        let mqtt_client = MqttClient::new(&config).with_subscription(self.topic.clone());
        let (event_tx, mut event_rx) = mpsc::channel::<MqttEvent>(64);
        let mqtt_loop = tokio::spawn(mqtt_client.run(event_tx));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = event_rx.recv() => match event {
                    Some(event) => {
                        self.handle_event(event);
                    }
                    None => {
                        error!("[MQTT] Event loop stopped unexpectedly");
                        break;
                    }
                },
            }
        }

        mqtt_loop.abort();
        info!("[MQTT] Ingest stopped");
    }

    /// Process one event from the MQTT event loop.
    ///
    /// Returns the new door state when the event changed it.
    pub fn handle_event(&mut self, event: MqttEvent) -> Option<DoorState> {
        match event {
            MqttEvent::Connected => {
                info!("[MQTT] Connected to broker");
                self.connected = true;
                self.dispatcher.publish_phase(ConnectionPhase::MqttConnected);
                None
            }
            MqttEvent::ConnectionError(reason) => {
                error!("[MQTT] Connection error: {}", reason);
                if self.connected {
                    self.connected = false;
                    self.dispatcher
                        .publish_phase(ConnectionPhase::MqttDisconnected);
                }
                None
            }
            MqttEvent::Message(msg) => self.handle_message(msg),
            MqttEvent::PublishAcked(_) => None,
        }
    }

    fn handle_message(&self, msg: MqttMessage) -> Option<DoorState> {
        if msg.topic != self.topic {
            debug!("[MQTT] Ignoring message on unexpected topic {}", msg.topic);
            return None;
        }
        debug!("[MQTT] Message received: {}", msg.payload);
        Some(self.dispatcher.apply(ingest(&msg.payload)))
    }
}
