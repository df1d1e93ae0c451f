//! Accepted bodies of the write endpoints.
//!
//! Two shapes arrive on the same endpoints:
//! - test/debug writes: `{"isOpen": true, "status": "..."}`
//! - broker relays (webhooks): `{"payload" | "message" | "status": "..."}`
//!
//! [`WriteRequest::into_command`] resolves them with one prioritized lookup:
//! `isOpen`, then `payload`, `message`, `status`.

use crate::error::{RelayError, Result};
use crate::state::DoorUpdate;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    #[serde(default)]
    pub is_open: Option<bool>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
    /// Sent by some webhook bridges. Logged, never routed on.
    #[serde(default)]
    pub topic: Option<Value>,
}

/// A resolved write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCommand {
    /// Force the door open/closed, optionally with a custom label.
    Force { is_open: bool, status: Option<String> },
    /// Raw sensor payload, mapped like a broker message.
    Relay(String),
}

impl WriteRequest {
    /// Parse a request body. An empty body is an empty request.
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| RelayError::InvalidRequest(e.to_string()))
    }

    pub fn into_command(self) -> Result<WriteCommand> {
        if let Some(is_open) = self.is_open {
            return Ok(WriteCommand::Force {
                is_open,
                status: self.status.and_then(text_field),
            });
        }

        [self.payload, self.message, self.status]
            .into_iter()
            .flatten()
            .find_map(text_field)
            .map(WriteCommand::Relay)
            .ok_or(RelayError::MissingDoorState)
    }
}

impl WriteCommand {
    pub fn into_update(self) -> DoorUpdate {
        match self {
            WriteCommand::Force { is_open, status } => DoorUpdate::forced(is_open, status),
            WriteCommand::Relay(payload) => DoorUpdate::from_payload(&payload),
        }
    }
}

// Empty strings and nulls count as absent. Non-string values are relayed as
// their JSON text.
fn text_field(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
