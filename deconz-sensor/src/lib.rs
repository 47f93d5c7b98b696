//! # deconz-sensor
//!
//! Presence (motion) sensor entities that subscribe to a running
//! [`deconz_stream::EventBridge`].
//!
//! The bridge invokes subscriber callbacks on its listener thread. A
//! [`MotionSensor`] keeps that hop short: it records the new state and pushes a
//! [`SensorChange`] down a channel, so the host application reacts on its own
//! thread by draining [`SensorChanges`].
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use deconz_sensor::{PlatformConfig, SensorPlatform};
//! use deconz_stream::{BridgeConfig, EventBridge};
//!
//! # fn main() -> deconz_stream::Result<()> {
//! let bridge = EventBridge::start(BridgeConfig::new())?;
//!
//! let config = PlatformConfig {
//!     sensors: BTreeMap::from([(7, "Hallway".to_string())]),
//! };
//! let platform = SensorPlatform::setup(&bridge.registry(), &config);
//!
//! for change in platform.changes() {
//!     println!("{} is {}", change.name, if change.is_on { "on" } else { "off" });
//! }
//! # Ok(())
//! # }
//! ```

pub mod iter;
pub mod motion;
pub mod platform;

pub use iter::{SensorChanges, Wait};
pub use motion::{MotionSensor, SensorChange, DEFAULT_NAME};
pub use platform::{PlatformConfig, SensorPlatform};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::iter::{SensorChanges, Wait};
    pub use crate::motion::{MotionSensor, SensorChange};
    pub use crate::platform::{PlatformConfig, SensorPlatform};
}
