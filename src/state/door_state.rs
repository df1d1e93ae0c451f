//! Door state model shared by the store, the dispatcher and the HTTP layer.
//!
//! The wire shape matches what the browser client expects:
//! `{"isOpen": bool, "status": "...", "lastUpdated": "<ISO-8601>"}`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{AsRefStr, Display, EnumString};

/// Status label reported when the sensor sees something in the doorway.
pub const STATUS_DETECTED: &str = "DETECTED";

/// Status label reported when the doorway is clear.
pub const STATUS_CLEAR: &str = "CLEAR";

/// Connection phases the sensor and the relay report to stream clients.
///
/// Clients use these to drive their "Connecting..." banners. The relay never
/// tracks phases per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionPhase {
    WifiConnecting,
    MqttConnecting,
    MqttDisconnected,
    MqttConnected,
}

/// A replacement value for the door state, before it is timestamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorUpdate {
    pub is_open: bool,
    pub status: String,
}

impl DoorUpdate {
    /// Map a raw sensor payload onto a door update.
    ///
    /// Only the exact token `DETECTED` means open. Anything else is a closed
    /// door carrying the payload text as its status label.
    pub fn from_payload(payload: &str) -> Self {
        Self {
            is_open: payload == STATUS_DETECTED,
            status: payload.to_string(),
        }
    }

    /// Build a forced update. Without an explicit status the label is
    /// derived from `is_open`.
    pub fn forced(is_open: bool, status: Option<String>) -> Self {
        let status = status.unwrap_or_else(|| {
            if is_open {
                STATUS_DETECTED.to_string()
            } else {
                STATUS_CLEAR.to_string()
            }
        });
        Self { is_open, status }
    }
}

/// The canonical door state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorState {
    pub is_open: bool,
    pub status: String,
    #[serde(serialize_with = "serialize_iso8601", deserialize_with = "deserialize_iso8601")]
    pub last_updated: DateTime<Utc>,
}

impl DoorState {
    /// Initial state of a freshly started relay: closed and clear.
    pub fn initial(at: DateTime<Utc>) -> Self {
        Self {
            is_open: false,
            status: STATUS_CLEAR.to_string(),
            last_updated: at,
        }
    }

    pub(crate) fn from_update(update: DoorUpdate, at: DateTime<Utc>) -> Self {
        Self {
            is_open: update.is_open,
            status: update.status,
            last_updated: at,
        }
    }
}

/// One event on the live stream.
///
/// Serialized untagged, so a state event is the plain door state object and a
/// phase event is `{"status": "MQTT_CONNECTED"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    State(DoorState),
    Phase { status: ConnectionPhase },
}

impl StreamEvent {
    pub fn phase(phase: ConnectionPhase) -> Self {
        StreamEvent::Phase { status: phase }
    }
}

// JavaScript's `Date.toISOString()` format, millisecond precision with a `Z`.
fn serialize_iso8601<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn deserialize_iso8601<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}
