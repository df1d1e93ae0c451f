use crate::relay::DEFAULT_STREAM_BUFFER;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Split `.env` content into key/value pairs.
///
/// Blank lines and `#` comments are skipped, values may contain spaces
/// without quoting, and one level of matching quotes is stripped.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let mut value = value.trim();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Load variables from a `.env` file in the working directory.
///
/// Variables already present in the environment win.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    let Ok(content) = fs::read_to_string(env_path) else {
        return;
    };

    for (key, value) in parse_dotenv(&content) {
        if std::env::var_os(&key).is_none() {
            // SAFETY: called from main before the tokio runtime spawns threads
            unsafe { std::env::set_var(key, value) };
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub http: HttpConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic the door sensor publishes to.
    pub topic: String,
    pub keep_alive_secs: u64,
    /// Pause before re-polling the broker after a connection error.
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Events buffered per stream client before it is dropped as too slow.
    pub stream_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Toggle the door every N seconds. `None` disables the simulation.
    pub interval_secs: Option<u64>,
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(5))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl HttpConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl SimulationConfig {
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Client id unique enough to share a public broker with other relays.
pub fn default_client_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("door-relay-{}", &id[..8])
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_host: "broker.hivemq.com".to_string(),
                broker_port: 1883,
                client_id: default_client_id(),
                username: None,
                password: None,
                topic: "home/ir/state".to_string(),
                keep_alive_secs: 30,
                retry_delay_secs: 5,
            },
            http: HttpConfig {
                host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port: 3000,
                stream_buffer: DEFAULT_STREAM_BUFFER,
            },
            simulation: SimulationConfig {
                interval_secs: None,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Unparseable values
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        // MQTT configuration
        if let Some(host) = lookup("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Some(p) = lookup("MQTT_BROKER_PORT").and_then(|v| v.parse().ok()) {
            config.mqtt.broker_port = p;
        }
        if let Some(client_id) = lookup("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Some(username) = lookup("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }
        if let Some(topic) = lookup("MQTT_TOPIC") {
            config.mqtt.topic = topic;
        }
        if let Some(secs) = lookup("MQTT_KEEP_ALIVE_SECS").and_then(|v| v.parse().ok()) {
            config.mqtt.keep_alive_secs = secs;
        }
        if let Some(secs) = lookup("MQTT_RETRY_DELAY_SECS").and_then(|v| v.parse().ok()) {
            config.mqtt.retry_delay_secs = secs;
        }

        // HTTP configuration
        if let Some(host) = lookup("HTTP_HOST").and_then(|v| v.parse().ok()) {
            config.http.host = host;
        }
        if let Some(port) = lookup("HTTP_PORT").and_then(|v| v.parse().ok()) {
            config.http.port = port;
        }
        if let Some(buffer) = lookup("STREAM_BUFFER").and_then(|v| v.parse().ok()) {
            config.http.stream_buffer = buffer;
        }

        if let Some(secs) = lookup("SIMULATE_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            config.simulation.interval_secs = Some(secs);
        }

        config
    }
}
