//! Subscriber registration keyed by resource identifier
//!
//! The registry is written from host threads (sensors attaching and detaching)
//! and read from the listener thread on every frame. Both sides go through a
//! `parking_lot::RwLock`; the callback is cloned out of the map and invoked
//! after the lock is released, so a callback may itself register or
//! unregister without deadlocking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Callback invoked with the decoded presence state
pub type Callback = Arc<dyn Fn(bool) + Send + Sync>;

/// Unique identifier for one registration slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

impl RegistrationId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "reg-{}", self.0)
    }
}

struct Subscription {
    registration_id: RegistrationId,
    callback: Callback,
}

/// Thread-safe map from resource identifier to subscriber callback
///
/// One slot per identifier: registering again for the same identifier
/// replaces the previous callback. Clones share the same map.
#[derive(Clone)]
pub struct SubscriberRegistry {
    subscriptions: Arc<RwLock<HashMap<String, Subscription>>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a callback for an identifier, replacing any existing one
    pub fn register<F>(&self, identifier: impl Into<String>, callback: F) -> RegistrationId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        let registration_id = RegistrationId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Subscription {
            registration_id,
            callback: Arc::new(callback),
        };

        let replaced = self
            .subscriptions
            .write()
            .insert(identifier.clone(), subscription);

        match replaced {
            Some(old) => tracing::debug!(
                "Replaced subscriber for {} ({} -> {})",
                identifier,
                old.registration_id,
                registration_id
            ),
            None => tracing::debug!("Registered subscriber for {} ({})", identifier, registration_id),
        }

        registration_id
    }

    /// Remove the subscriber for an identifier, whoever registered it
    pub fn unregister(&self, identifier: &str) -> bool {
        let removed = self.subscriptions.write().remove(identifier).is_some();
        if removed {
            tracing::debug!("Unregistered subscriber for {}", identifier);
        }
        removed
    }

    /// Remove the subscriber for an identifier only if it is still the given registration
    ///
    /// Used by subscribers on teardown so that dropping a stale subscriber does
    /// not evict a newer registration for the same identifier.
    pub fn release(&self, identifier: &str, registration_id: RegistrationId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let owned = subscriptions
            .get(identifier)
            .is_some_and(|current| current.registration_id == registration_id);

        if owned {
            subscriptions.remove(identifier);
            tracing::debug!("Released subscriber for {} ({})", identifier, registration_id);
        }
        owned
    }

    /// Look up the callback for an identifier
    pub fn lookup(&self, identifier: &str) -> Option<Callback> {
        self.subscriptions
            .read()
            .get(identifier)
            .map(|subscription| Arc::clone(&subscription.callback))
    }

    /// Invoke the subscriber for an identifier, returning whether one was found
    pub fn dispatch(&self, identifier: &str, state: bool) -> bool {
        match self.lookup(identifier) {
            Some(callback) => {
                callback(state);
                true
            }
            None => false,
        }
    }

    /// Registration currently holding the slot for an identifier
    pub fn registration_id(&self, identifier: &str) -> Option<RegistrationId> {
        self.subscriptions
            .read()
            .get(identifier)
            .map(|subscription| subscription.registration_id)
    }

    /// Check if an identifier has a subscriber
    pub fn contains(&self, identifier: &str) -> bool {
        self.subscriptions.read().contains_key(identifier)
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All identifiers with a subscriber
    pub fn identifiers(&self) -> Vec<String> {
        self.subscriptions.read().keys().cloned().collect()
    }

    /// Remove every subscriber
    pub fn clear(&self) {
        self.subscriptions.write().clear();
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscriber_count", &self.len())
            .finish()
    }
}
