//! Sensor platform setup from configuration
//!
//! A platform turns an `id -> name` map into attached [`MotionSensor`]s that
//! all report into one change channel.

use std::collections::BTreeMap;
use std::sync::{mpsc, Arc};

use deconz_stream::SubscriberRegistry;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::iter::SensorChanges;
use crate::motion::{MotionSensor, SensorChange};

/// Sensors to attach, keyed by gateway identifier
///
/// Deserializes from `{"sensors": {"7": "Hallway", "12": "Porch"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub sensors: BTreeMap<u32, String>,
}

/// A set of motion sensors sharing one change channel
pub struct SensorPlatform {
    sensors: Vec<MotionSensor>,
    changes_rx: Arc<Mutex<mpsc::Receiver<SensorChange>>>,
}

impl SensorPlatform {
    /// Attach one sensor per configured identifier
    pub fn setup(registry: &SubscriberRegistry, config: &PlatformConfig) -> Self {
        let (changes_tx, changes_rx) = mpsc::channel();

        let sensors: Vec<MotionSensor> = config
            .sensors
            .iter()
            .map(|(id, name)| {
                MotionSensor::attach_with_notifier(
                    registry,
                    id.to_string(),
                    name.clone(),
                    changes_tx.clone(),
                )
            })
            .collect();

        tracing::info!("Set up {} motion sensors", sensors.len());

        Self {
            sensors,
            changes_rx: Arc::new(Mutex::new(changes_rx)),
        }
    }

    /// All sensors, ordered by identifier
    pub fn sensors(&self) -> &[MotionSensor] {
        &self.sensors
    }

    /// Look up a sensor by gateway identifier
    pub fn sensor(&self, id: &str) -> Option<&MotionSensor> {
        self.sensors.iter().find(|sensor| sensor.id() == id)
    }

    /// Blocking iterator over updates from every sensor of this platform
    pub fn changes(&self) -> SensorChanges {
        SensorChanges::new(Arc::clone(&self.changes_rx))
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

impl std::fmt::Debug for SensorPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorPlatform")
            .field("sensors", &self.sensors)
            .finish()
    }
}
