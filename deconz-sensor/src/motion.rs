//! Binary presence sensor backed by the gateway event stream

use std::sync::{mpsc, Arc};
use std::time::Instant;

use deconz_stream::{RegistrationId, SubscriberRegistry};
use parking_lot::RwLock;

/// Name given to sensors configured without one
pub const DEFAULT_NAME: &str = "Unnamed Device";

/// A state update delivered to a sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorChange {
    /// Gateway identifier of the sensor
    pub sensor_id: String,
    /// Display name of the sensor
    pub name: String,
    /// New presence state
    pub is_on: bool,
    /// State before this update, `None` for the first one
    pub previous: Option<bool>,
    /// When the update was applied
    pub timestamp: Instant,
}

impl SensorChange {
    /// Whether the update actually changed the state
    pub fn is_change(&self) -> bool {
        self.previous != Some(self.is_on)
    }
}

/// Presence sensor subscribed to one gateway identifier
///
/// The sensor is pushed to, never polled: its state is `None` until the first
/// frame for its identifier arrives. Dropping the sensor releases its
/// registration, unless a newer subscriber has since taken the identifier.
pub struct MotionSensor {
    id: String,
    name: String,
    state: Arc<RwLock<Option<bool>>>,
    registry: SubscriberRegistry,
    registration_id: RegistrationId,
}

impl MotionSensor {
    /// Attach a sensor to the registry
    pub fn attach(registry: &SubscriberRegistry, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::attach_inner(registry, id.into(), name.into(), None)
    }

    /// Attach a sensor that also reports every update on `notifier`
    pub fn attach_with_notifier(
        registry: &SubscriberRegistry,
        id: impl Into<String>,
        name: impl Into<String>,
        notifier: mpsc::Sender<SensorChange>,
    ) -> Self {
        Self::attach_inner(registry, id.into(), name.into(), Some(notifier))
    }

    fn attach_inner(
        registry: &SubscriberRegistry,
        id: String,
        name: String,
        notifier: Option<mpsc::Sender<SensorChange>>,
    ) -> Self {
        let name = if name.trim().is_empty() {
            DEFAULT_NAME.to_string()
        } else {
            name
        };
        let state = Arc::new(RwLock::new(None));

        let callback = {
            let state = Arc::clone(&state);
            let id = id.clone();
            let name = name.clone();
            move |is_on: bool| {
                let previous = state.write().replace(is_on);
                tracing::debug!("Setting state of {} ({}) to {}", name, id, is_on);

                if let Some(notifier) = &notifier {
                    let change = SensorChange {
                        sensor_id: id.clone(),
                        name: name.clone(),
                        is_on,
                        previous,
                        timestamp: Instant::now(),
                    };
                    if notifier.send(change).is_err() {
                        tracing::trace!("No receiver for changes of sensor {}", id);
                    }
                }
            }
        };

        let registration_id = registry.register(id.clone(), callback);

        Self {
            id,
            name,
            state,
            registry: registry.clone(),
            registration_id,
        }
    }

    /// Gateway identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current presence state, `None` before the first update
    pub fn is_on(&self) -> Option<bool> {
        *self.state.read()
    }

    /// State arrives from the gateway; there is nothing to poll
    pub fn should_poll(&self) -> bool {
        false
    }

    /// Registration made for this sensor when it attached
    pub fn registration_id(&self) -> RegistrationId {
        self.registration_id
    }

    /// Whether this sensor still owns the registry slot for its identifier
    pub fn is_attached(&self) -> bool {
        self.registry.registration_id(&self.id) == Some(self.registration_id)
    }
}

impl Drop for MotionSensor {
    fn drop(&mut self) {
        if self.registry.release(&self.id, self.registration_id) {
            tracing::debug!("Sensor {} ({}) detached", self.name, self.id);
        }
    }
}

impl std::fmt::Debug for MotionSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionSensor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("is_on", &self.is_on())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_follows_dispatch() {
        let registry = SubscriberRegistry::new();
        let sensor = MotionSensor::attach(&registry, "7", "Hallway");

        assert_eq!(sensor.id(), "7");
        assert_eq!(sensor.name(), "Hallway");
        assert_eq!(sensor.is_on(), None);
        assert!(!sensor.should_poll());

        assert!(registry.dispatch("7", true));
        assert_eq!(sensor.is_on(), Some(true));

        registry.dispatch("7", false);
        assert_eq!(sensor.is_on(), Some(false));
    }

    #[test]
    fn test_blank_name_uses_default() {
        let registry = SubscriberRegistry::new();
        let sensor = MotionSensor::attach(&registry, "7", "  ");
        assert_eq!(sensor.name(), DEFAULT_NAME);
    }

    #[test]
    fn test_notifier_receives_changes() {
        let registry = SubscriberRegistry::new();
        let (tx, rx) = mpsc::channel();
        let _sensor = MotionSensor::attach_with_notifier(&registry, "7", "Hallway", tx);

        registry.dispatch("7", true);
        registry.dispatch("7", true);
        registry.dispatch("7", false);

        let changes: Vec<_> = rx.try_iter().collect();
        assert_eq!(changes.len(), 3);

        assert_eq!(changes[0].sensor_id, "7");
        assert_eq!(changes[0].name, "Hallway");
        assert_eq!(changes[0].previous, None);
        assert!(changes[0].is_change());

        assert_eq!(changes[1].previous, Some(true));
        assert!(!changes[1].is_change());

        assert!(!changes[2].is_on);
        assert!(changes[2].is_change());
    }

    #[test]
    fn test_drop_releases_registration() {
        let registry = SubscriberRegistry::new();
        let sensor = MotionSensor::attach(&registry, "7", "Hallway");
        assert!(sensor.is_attached());
        assert!(registry.contains("7"));

        drop(sensor);
        assert!(!registry.contains("7"));
        assert!(!registry.dispatch("7", true));
    }

    #[test]
    fn test_stale_sensor_drop_keeps_newer_registration() {
        let registry = SubscriberRegistry::new();
        let stale = MotionSensor::attach(&registry, "7", "Old hallway");
        let current = MotionSensor::attach(&registry, "7", "Hallway");

        assert!(!stale.is_attached());
        assert!(current.is_attached());

        drop(stale);
        registry.dispatch("7", true);

        assert!(current.is_attached());
        assert_eq!(current.is_on(), Some(true));
    }

    #[test]
    fn test_registration_id_tracks_slot() {
        let registry = SubscriberRegistry::new();
        let sensor = MotionSensor::attach(&registry, "7", "Hallway");

        assert_eq!(registry.registration_id("7"), Some(sensor.registration_id()));
    }
}
