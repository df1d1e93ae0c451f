//! MQTT client wrapper for the door sensor broker.

use crate::config::MqttConfig;
use log::{debug, error, info};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;

/// Message received from MQTT broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// What the event loop reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    /// The broker accepted the connection and subscriptions were re-issued.
    Connected,
    /// Connecting failed or an established connection dropped.
    ConnectionError(String),
    /// A publish arrived on a subscribed topic.
    Message(MqttMessage),
    /// The broker acknowledged one of our QoS 1 publishes.
    PublishAcked(u16),
}

/// MQTT client for the door sensor topic.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
    subscriptions: Vec<String>,
    retry_delay: Duration,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(config.keep_alive());

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self {
            client,
            event_loop,
            subscriptions: Vec::new(),
            retry_delay: config.retry_delay(),
        }
    }

    /// Subscribe to `topic` on every (re)connect.
    ///
    /// The session is clean, so the broker forgets subscriptions when the
    /// connection drops. They are re-issued each time a ConnAck arrives.
    pub fn with_subscription(mut self, topic: impl Into<String>) -> Self {
        self.subscriptions.push(topic.into());
        self
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Run the MQTT event loop and forward events to the provided channel.
    ///
    /// Runs until the receiving side of `tx` is dropped. Reconnection is
    /// rumqttc's: polling again after an error opens a fresh connection.
    pub async fn run(mut self, tx: mpsc::Sender<MqttEvent>) {
        info!("[MQTT] Starting event loop");

        loop {
            let event = match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        MqttEvent::ConnectionError(format!("{:?}", ack.code))
                    } else {
                        self.resubscribe();
                        MqttEvent::Connected
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = decode_payload(&publish.payload);
                    debug!("[MQTT] Received on {}: {}", publish.topic, payload);
                    MqttEvent::Message(MqttMessage {
                        topic: publish.topic,
                        payload,
                    })
                }
                Ok(Event::Incoming(Packet::PubAck(ack))) => MqttEvent::PublishAcked(ack.pkid),
                Ok(_) => continue,
                Err(e) => {
                    if tx.send(MqttEvent::ConnectionError(e.to_string())).await.is_err() {
                        break;
                    }
                    // Wait before the next poll reconnects
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
            };

            if tx.send(event).await.is_err() {
                debug!("[MQTT] Event channel closed, stopping event loop");
                break;
            }
        }
    }

    // Called from inside the poll loop, so it must not wait on the request
    // channel the loop itself drains.
    fn resubscribe(&self) {
        for topic in &self.subscriptions {
            match self.client.try_subscribe(topic, QoS::AtMostOnce) {
                Ok(()) => info!("[MQTT] Subscribed to topic: {}", topic),
                Err(e) => error!("[MQTT] Subscription error for {}: {}", topic, e),
            }
        }
    }
}

/// Payload text as the sensor sent it. Invalid UTF-8 is replaced, not
/// rejected: every message on the door topic updates the state.
pub fn decode_payload(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DoorUpdate;

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload(b"DETECTED"), "DETECTED");
        assert_eq!(decode_payload(b""), "");
    }

    #[test]
    fn test_invalid_utf8_maps_to_closed_state() {
        let payload = decode_payload(b"\xffDETECTED");
        assert_eq!(payload, "\u{FFFD}DETECTED");

        let update = DoorUpdate::from_payload(&payload);
        assert!(!update.is_open);
        assert_eq!(update.status, "\u{FFFD}DETECTED");
    }
}
