//! Error types for forwarding.

use thiserror::Error;

/// Errors that can occur while forwarding snapshots to a broker.
#[derive(Debug, Error)]
pub enum ForwarderError {
    /// The broker settings are unusable.
    #[error("Invalid broker configuration: {0}")]
    Config(String),

    /// Connecting to the broker failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The broker refused or failed to accept a message.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// The publisher has already been closed.
    #[error("Publisher is closed")]
    Closed,

    /// Failed to serialize the document.
    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(feature = "amqp")]
impl From<lapin::Error> for ForwarderError {
    fn from(err: lapin::Error) -> Self {
        match err {
            lapin::Error::IOError(_) | lapin::Error::InvalidConnectionState(_) => {
                ForwarderError::Connection(err.to_string())
            }
            _ => ForwarderError::Publish(err.to_string()),
        }
    }
}
