//! Error types for the deconz-stream crate.

use std::time::Duration;

/// Errors surfaced by the bridge to its owner.
///
/// Only startup and teardown fail loudly. Everything that goes wrong while
/// frames are flowing is absorbed by the listener loop.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The connection to the gateway could not be established
    #[error("Failed to connect to {target}: {reason}")]
    Connection {
        /// Address or URL that was dialed
        target: String,
        /// Transport error text
        reason: String,
    },

    /// The connection attempt did not complete in time
    #[error("Timed out connecting to {target} after {timeout:?}")]
    ConnectTimeout {
        /// Address or URL that was dialed
        target: String,
        /// Configured connect timeout
        timeout: Duration,
    },

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The listener's tokio runtime could not be built
    #[error("Failed to build listener runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The listener thread could not be spawned
    #[error("Failed to spawn listener thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The listener thread exited before reporting its connection result
    #[error("Listener thread exited before the connection was established")]
    ListenerExited,

    /// The listener thread did not finish within the shutdown timeout
    #[error("Listener did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Reasons a single frame is dropped by the listener loop.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload is not a JSON object
    #[error("Malformed frame payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// A required field is absent
    #[error("Frame is missing required field `{0}`")]
    MissingField(&'static str),

    /// A required field is present with an unusable type
    #[error("Frame field `{field}` has unexpected type: {found}")]
    InvalidField {
        /// Wire name of the field
        field: &'static str,
        /// JSON type that was found
        found: &'static str,
    },
}

/// Convenience type alias for Results using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
