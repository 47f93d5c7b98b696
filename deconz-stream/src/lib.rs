//! # deconz-stream
//!
//! A sync-first bridge that keeps one long-lived connection to a deCONZ gateway
//! open, decodes the sensor frames it pushes, and dispatches presence state to
//! subscribers registered by identifier.
//!
//! ## Overview
//!
//! The gateway pushes a JSON object per frame:
//!
//! ```text
//! {"e":"changed","id":"7","r":"sensors","state":{"presence":true}}
//! ```
//!
//! The bridge owns the connection and a background listener thread. Callers
//! register one callback per sensor identifier and receive a `bool` every time
//! a `sensors` frame for that identifier arrives.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use deconz_stream::{BridgeConfig, EventBridge};
//!
//! # fn main() -> deconz_stream::Result<()> {
//! let config = BridgeConfig::new().with_host("192.168.1.20").with_port("8088");
//! let bridge = EventBridge::start(config)?;
//!
//! bridge.registry().register("7", |presence| {
//!     println!("hallway presence: {presence}");
//! });
//!
//! // ... later, from any thread
//! bridge.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! gateway ──► Connection ──► listener thread ──► SubscriberRegistry ──► callback
//!                 ▲               (decode, route)
//!                 │
//!   EventBridge::shutdown() ── signal ──┘
//! ```
//!
//! 1. **Connection Manager** ([`connection`]): WebSocket or newline-delimited TCP
//! 2. **Listener Loop** ([`listener`]): one thread with its own tokio runtime
//! 3. **Subscriber Registry** ([`registry`]): lock-guarded identifier map
//! 4. **Shutdown Coordinator** ([`EventBridge::shutdown`]): signal, close, bounded join
//!
//! There is no automatic reconnection. When the gateway drops the connection
//! the bridge moves to [`ConnectionState::Closed`]; the owner can bring up a new
//! bridge over the same registry with [`EventBridge::start_with_registry`].

pub mod bridge;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod listener;
pub mod logging;
pub mod registry;

// Re-export main types for convenience
pub use bridge::{BridgeStats, EventBridge};
pub use config::{BridgeConfig, Transport};
pub use connection::ConnectionState;
pub use error::{BridgeError, FrameError, Result};
pub use frame::{Frame, SENSOR_RESOURCE};
pub use registry::{RegistrationId, SubscriberRegistry};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BridgeConfig, BridgeError, ConnectionState, EventBridge, Frame, RegistrationId, Result,
        SubscriberRegistry, Transport,
    };
}
