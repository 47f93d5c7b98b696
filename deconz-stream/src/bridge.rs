//! Sync-first event bridge
//!
//! [`EventBridge`] is the explicit handle to one running bridge: the
//! connection, the listener thread and the registry it dispatches into.
//! All methods are blocking; the async transport lives on the listener thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::config::BridgeConfig;
use crate::connection::{ConnectionState, SharedConnectionState};
use crate::error::{BridgeError, Result};
use crate::listener::{spawn_listener, Dispatch};
use crate::registry::SubscriberRegistry;

/// Snapshot of frame counters since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Frames read from the connection
    pub frames_received: u64,
    /// Frames handed to a subscriber
    pub frames_delivered: u64,
    /// Frames for other resource types or identifiers without a subscriber
    pub frames_ignored: u64,
    /// Malformed or ill-formed frames, and frames whose subscriber panicked
    pub frames_dropped: u64,
}

impl std::fmt::Display for BridgeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "received={} delivered={} ignored={} dropped={}",
            self.frames_received, self.frames_delivered, self.frames_ignored, self.frames_dropped
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    received: AtomicU64,
    delivered: AtomicU64,
    ignored: AtomicU64,
    dropped: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record(&self, outcome: &Dispatch) {
        self.received.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Dispatch::Delivered { .. } => &self.delivered,
            Dispatch::NoSubscriber { .. } | Dispatch::Ignored { .. } => &self.ignored,
            Dispatch::Dropped { .. } | Dispatch::SubscriberPanicked { .. } => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            frames_received: self.received.load(Ordering::Relaxed),
            frames_delivered: self.delivered.load(Ordering::Relaxed),
            frames_ignored: self.ignored.load(Ordering::Relaxed),
            frames_dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the bridge handle and its listener thread
#[derive(Debug)]
pub(crate) struct BridgeShared {
    pub(crate) registry: SubscriberRegistry,
    pub(crate) state: SharedConnectionState,
    pub(crate) stats: StatsCounters,
    stopping: AtomicBool,
}

impl BridgeShared {
    fn new(registry: SubscriberRegistry) -> Self {
        Self {
            registry,
            state: SharedConnectionState::new(),
            stats: StatsCounters::default(),
            stopping: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }
}

/// Handle to a running gateway bridge
///
/// Created by [`EventBridge::start`], shared by reference (or `Arc`) with every
/// caller that needs to register subscribers or stop the bridge.
///
/// # Example
///
/// ```rust,no_run
/// use deconz_stream::{BridgeConfig, EventBridge, Transport};
///
/// # fn main() -> deconz_stream::Result<()> {
/// let bridge = EventBridge::start(BridgeConfig::new().with_transport(Transport::Lines))?;
/// bridge.registry().register("7", |presence| println!("7 -> {presence}"));
///
/// // Orderly teardown; a second call is a no-op
/// bridge.shutdown()?;
/// bridge.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct EventBridge {
    shared: Arc<BridgeShared>,
    target: String,
    shutdown_timeout: Duration,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    done_rx: Mutex<mpsc::Receiver<()>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    listener_thread: ThreadId,
}

impl EventBridge {
    /// Connect to the gateway and start the listener with an empty registry
    ///
    /// Blocks until the connection is established or fails.
    pub fn start(config: BridgeConfig) -> Result<Self> {
        Self::start_with_registry(config, SubscriberRegistry::new())
    }

    /// Connect to the gateway and start the listener over an existing registry
    ///
    /// This is how an owner restarts after the gateway dropped the connection:
    /// subscribers registered on the old bridge keep receiving frames.
    pub fn start_with_registry(config: BridgeConfig, registry: SubscriberRegistry) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(BridgeShared::new(registry));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let target = config.target();
        let shutdown_timeout = config.shutdown_timeout;
        let worker = spawn_listener(config, Arc::clone(&shared), ready_tx, shutdown_rx, done_tx)?;

        // The listener applies the connect timeout itself, so this is bounded
        let ready = ready_rx.recv();
        match ready {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(BridgeError::ListenerExited);
            }
        }

        Ok(Self {
            shared,
            target,
            shutdown_timeout,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            done_rx: Mutex::new(done_rx),
            listener_thread: worker.thread().id(),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Registry this bridge dispatches into
    ///
    /// The returned handle shares state with the bridge; registrations made
    /// through it take effect on the next frame.
    pub fn registry(&self) -> SubscriberRegistry {
        self.shared.registry.clone()
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Whether the listener is still reading frames
    pub fn is_running(&self) -> bool {
        self.connection_state() == ConnectionState::Connected && !self.shared.is_stopping()
    }

    /// Address or URL of the gateway
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Frame counters since startup
    pub fn stats(&self) -> BridgeStats {
        self.shared.stats.snapshot()
    }

    /// Block until the listener stops on its own, or the timeout expires
    ///
    /// Returns `true` if the listener has stopped.
    pub fn wait_closed(&self, timeout: Duration) -> bool {
        match self.done_rx.lock().recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => true,
            Err(mpsc::RecvTimeoutError::Timeout) => false,
        }
    }

    /// Close the connection and wait for the listener thread to finish
    ///
    /// Once this returns `Ok`, no further frame is dispatched. Calling it again
    /// is a no-op. Called from a subscriber (on the listener thread itself) it
    /// only signals the listener, which stops after the current callback.
    pub fn shutdown(&self) -> Result<()> {
        if !self.shared.stopping.swap(true, Ordering::AcqRel) {
            tracing::info!("Shutting down bridge to {}", self.target);

            if let Some(tx) = self.shutdown_tx.lock().take() {
                // Fails only if the listener already ended on its own
                let _ = tx.send(());
            }
        }

        if thread::current().id() == self.listener_thread {
            tracing::debug!("Shutdown of {} requested from the listener thread", self.target);
            return Ok(());
        }

        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            tracing::debug!("Bridge to {} already shut down", self.target);
            return Ok(());
        };

        if !self.wait_closed(self.shutdown_timeout) {
            tracing::warn!(
                "Listener for {} did not stop within {:?}",
                self.target,
                self.shutdown_timeout
            );
            *worker = Some(handle);
            return Err(BridgeError::ShutdownTimeout(self.shutdown_timeout));
        }

        if handle.join().is_err() {
            tracing::error!("Listener thread for {} panicked", self.target);
        }

        Ok(())
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        tracing::debug!(
            "EventBridge dropping, {} registered subscribers",
            self.shared.registry.len()
        );

        if let Err(e) = self.shutdown() {
            tracing::warn!("Bridge shutdown on drop failed: {}", e);
        }
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("target", &self.target)
            .field("state", &self.connection_state())
            .field("subscribers", &self.shared.registry.len())
            .finish()
    }
}
