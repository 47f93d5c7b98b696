//! Background listener thread
//!
//! Spawns a thread with its own tokio runtime that owns the gateway
//! connection, reads frames in arrival order and routes them to the
//! subscriber registry, while the parent [`EventBridge`](crate::EventBridge)
//! stays fully synchronous.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;

use crate::bridge::BridgeShared;
use crate::config::BridgeConfig;
use crate::connection::{Connection, ConnectionState};
use crate::error::{BridgeError, FrameError, Result};
use crate::frame::Frame;
use crate::registry::SubscriberRegistry;

/// What happened to a single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A subscriber was invoked with the presence state
    Delivered {
        /// Resource identifier
        id: String,
        /// State handed to the subscriber
        presence: bool,
    },
    /// Sensor frame for an identifier nobody registered
    NoSubscriber {
        /// Resource identifier
        id: String,
    },
    /// Frame for a resource type the bridge does not route
    Ignored {
        /// Resource type tag
        resource: String,
    },
    /// The subscriber panicked while handling the frame
    SubscriberPanicked {
        /// Resource identifier
        id: String,
    },
    /// Frame could not be decoded or lacked a required field
    Dropped {
        /// Why the frame was dropped
        reason: String,
    },
}

/// Decode one frame payload and route it to its subscriber.
///
/// Never fails: malformed and ill-formed frames are logged and reported as
/// [`Dispatch::Dropped`] so the caller can keep reading. A panicking
/// subscriber is contained here as well.
pub fn route_frame(registry: &SubscriberRegistry, sensor_resource: &str, payload: &str) -> Dispatch {
    tracing::debug!("Frame: {}", payload);

    let frame = match Frame::decode(payload) {
        Ok(frame) => frame,
        Err(e @ FrameError::Decode(_)) => {
            tracing::warn!("Dropping malformed frame: {}", e);
            return Dispatch::Dropped {
                reason: e.to_string(),
            };
        }
        Err(e) => {
            tracing::debug!("Dropping ill-formed frame: {}", e);
            return Dispatch::Dropped {
                reason: e.to_string(),
            };
        }
    };

    if !frame.is_resource(sensor_resource) {
        return Dispatch::Ignored {
            resource: frame.resource,
        };
    }

    let presence = frame.presence();
    tracing::debug!("Sensor {} presence {}", frame.id, presence);

    let Some(callback) = registry.lookup(&frame.id) else {
        return Dispatch::NoSubscriber { id: frame.id };
    };

    match panic::catch_unwind(AssertUnwindSafe(|| callback(presence))) {
        Ok(()) => Dispatch::Delivered {
            id: frame.id,
            presence,
        },
        Err(payload) => {
            tracing::error!(
                "Subscriber for {} panicked: {}",
                frame.id,
                panic_message(payload.as_ref())
            );
            Dispatch::SubscriberPanicked { id: frame.id }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Spawns the listener thread.
///
/// The thread connects first and reports the outcome on `ready_tx`; only a
/// successful connection moves on to the read loop. `done_tx` is held for the
/// thread's whole life so that its disconnection tells the shutdown
/// coordinator the thread has finished.
pub(crate) fn spawn_listener(
    config: BridgeConfig,
    shared: Arc<BridgeShared>,
    ready_tx: mpsc::SyncSender<Result<()>>,
    shutdown_rx: oneshot::Receiver<()>,
    done_tx: mpsc::Sender<()>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("deconz-listener".to_string())
        .spawn(move || {
            let _done = done_tx;

            // Single-threaded runtime: the listener is the only task on it
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to create tokio runtime for listener: {}", e);
                    let _ = ready_tx.send(Err(BridgeError::Runtime(e)));
                    return;
                }
            };

            rt.block_on(async move {
                let connection = match Connection::connect(&config).await {
                    Ok(connection) => connection,
                    Err(e) => {
                        tracing::warn!("Failed to connect to {}: {}", config.target(), e);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                shared.state.set(ConnectionState::Connected);
                tracing::info!("Connected to {}", config.target());
                let _ = ready_tx.send(Ok(()));

                run_listener(connection, &config.sensor_resource, &shared, shutdown_rx).await;
            });
        })
        .map_err(BridgeError::Spawn)
}

/// Main read loop running inside the listener's runtime
async fn run_listener(
    mut connection: Connection,
    sensor_resource: &str,
    shared: &BridgeShared,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    tracing::info!("Listener started");

    loop {
        tokio::select! {
            biased;

            // A dropped sender counts as a shutdown request too
            _ = &mut shutdown_rx => {
                tracing::debug!("Listener received shutdown signal");
                break;
            }

            frame = connection.next_frame() => {
                let Some(payload) = frame.filter(|payload| !payload.is_empty()) else {
                    tracing::info!("Gateway stream ended, listener stopping");
                    break;
                };

                if shared.is_stopping() {
                    break;
                }

                let outcome = route_frame(&shared.registry, sensor_resource, &payload);
                shared.stats.record(&outcome);
            }
        }
    }

    shared.state.set(ConnectionState::Closing);
    connection.close().await;
    shared.state.set(ConnectionState::Closed);

    tracing::info!("Listener shut down");
}
