//! Publish one door sensor payload to the broker.
//!
//! Usage:
//!   cargo run --bin door-publish
//!   cargo run --bin door-publish -- CLEAR
//!   cargo run --bin door-publish -- --topic home/ir/state WIFI_CONNECTING
//!
//! Stands in for the physical sensor when exercising the relay end to end.

use clap::Parser;
use log::{info, warn};
use rumqttc::{AsyncClient, QoS};
use std::time::Duration;
use tokio::sync::mpsc;

use door_relay::config::{self, Config};
use door_relay::error::{RelayError, Result};
use door_relay::input::mqtt::{MqttClient, MqttEvent};

#[derive(Parser)]
#[command(name = "door-publish")]
#[command(about = "Publish a door sensor payload to the MQTT broker")]
struct Cli {
    /// Payload to publish (DETECTED opens the door, anything else closes it)
    #[arg(default_value = "DETECTED")]
    payload: String,

    /// Topic override
    #[arg(long, env = "MQTT_TOPIC")]
    topic: Option<String>,

    /// Seconds to wait for the broker before giving up
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(topic) = cli.topic.clone() {
        config.mqtt.topic = topic;
    }

    let timeout = Duration::from_secs(cli.timeout_secs);
    match tokio::time::timeout(timeout, publish(&config, &cli.payload)).await {
        Ok(Ok(())) => info!("Published {:?} to {}", cli.payload, config.mqtt.topic),
        Ok(Err(e)) => {
            warn!("Publish failed: {}", e);
            std::process::exit(1);
        }
        Err(_) => {
            warn!("No acknowledgement from broker after {:?}", timeout);
            std::process::exit(1);
        }
    }
}

async fn publish(config: &Config, payload: &str) -> Result<()> {
    info!(
        "Connecting to MQTT broker at {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );

    let mqtt_client = MqttClient::new(&config.mqtt);
    let async_client = mqtt_client.client();

    let (event_tx, mut event_rx) = mpsc::channel(16);
    let mqtt_handle = tokio::spawn(mqtt_client.run(event_tx));

    let result = publish_when_connected(&async_client, &mut event_rx, &config.mqtt.topic, payload).await;

    let _ = async_client.disconnect().await;
    mqtt_handle.abort();
    result
}

async fn publish_when_connected(
    client: &AsyncClient,
    events: &mut mpsc::Receiver<MqttEvent>,
    topic: &str,
    payload: &str,
) -> Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            MqttEvent::Connected => {
                client
                    .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes())
                    .await?;
            }
            MqttEvent::PublishAcked(_) => return Ok(()),
            MqttEvent::ConnectionError(reason) => warn!("Connection error: {}", reason),
            MqttEvent::Message(_) => {}
        }
    }
    Err(RelayError::MqttLoopStopped)
}
