//! Configuration types for the deconz-stream crate
//!
//! Host and port arrive as plain strings from whatever loads the host
//! application's configuration; everything else has a sensible default.

use std::time::Duration;

use url::Url;

use crate::error::BridgeError;
use crate::frame::SENSOR_RESOURCE;

/// Default gateway host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default gateway websocket port
pub const DEFAULT_PORT: &str = "443";

/// Wire framing used on the gateway connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// One JSON object per websocket text message (`ws://host:port`)
    #[default]
    WebSocket,
    /// One JSON object per newline-terminated line over plain TCP
    Lines,
}

/// Configuration for the EventBridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Gateway host name or IP address
    /// Default: "127.0.0.1"
    pub host: String,

    /// Gateway port, as a string
    /// Default: "443"
    pub port: String,

    /// Wire framing
    /// Default: WebSocket
    pub transport: Transport,

    /// Upper bound on establishing the connection
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Upper bound on waiting for the listener to stop
    /// Default: 5 seconds
    pub shutdown_timeout: Duration,

    /// Resource tag of frames that carry sensor state
    /// Default: "sensors"
    pub sensor_resource: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT.to_string(),
            transport: Transport::default(),
            connect_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            sensor_resource: SENSOR_RESOURCE.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Create a new BridgeConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.host.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "Host must not be empty".to_string(),
            ));
        }

        match self.port.trim().parse::<u16>() {
            Ok(0) | Err(_) => {
                return Err(BridgeError::Configuration(format!(
                    "Invalid port: {:?}",
                    self.port
                )));
            }
            Ok(_) => {}
        }

        if self.connect_timeout == Duration::ZERO {
            return Err(BridgeError::Configuration(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.shutdown_timeout == Duration::ZERO {
            return Err(BridgeError::Configuration(
                "Shutdown timeout must be greater than 0".to_string(),
            ));
        }

        if self.sensor_resource.is_empty() {
            return Err(BridgeError::Configuration(
                "Sensor resource tag must not be empty".to_string(),
            ));
        }

        if self.transport == Transport::WebSocket {
            self.websocket_url()?;
        }

        Ok(())
    }

    /// `host:port` as dialed by the lines transport
    pub fn address(&self) -> String {
        format!("{}:{}", self.host.trim(), self.port.trim())
    }

    /// `ws://host:port` as dialed by the websocket transport
    pub fn websocket_url(&self) -> Result<Url, BridgeError> {
        let raw = format!("ws://{}", self.address());
        Url::parse(&raw)
            .map_err(|e| BridgeError::Configuration(format!("Invalid gateway URL {raw}: {e}")))
    }

    /// Human-readable connection target for logs and errors
    pub fn target(&self) -> String {
        match self.transport {
            Transport::WebSocket => format!("ws://{}", self.address()),
            Transport::Lines => self.address(),
        }
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_sensor_resource(mut self, resource: impl Into<String>) -> Self {
        self.sensor_resource = resource.into();
        self
    }
}
