use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum RelayError {
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("Request carries no door state (expected isOpen, payload, message or status)")]
    MissingDoorState,

    #[error("Failed to bind HTTP listener on {addr}: {source}")]
    BindFailed {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("MQTT client error: {0}")]
    MqttClient(#[from] rumqttc::ClientError),

    #[error("MQTT event loop stopped")]
    MqttLoopStopped,

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
