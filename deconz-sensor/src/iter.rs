//! Host-side access to sensor changes
//!
//! Sensor callbacks run on the bridge's listener thread and only push
//! [`SensorChange`]s into a channel. [`SensorChanges`] is the receiving end,
//! read from whatever thread the host application uses.

use std::sync::{mpsc, Arc};
use std::time::Duration;

use parking_lot::Mutex;

use crate::motion::SensorChange;

/// Result of waiting a bounded time for the next change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wait {
    /// A change arrived
    Change(SensorChange),
    /// Nothing arrived in time; more may follow
    Timeout,
    /// Every sensor feeding the channel is gone
    Closed,
}

/// Receiver of sensor changes, shared by all clones
///
/// As an [`Iterator`] it blocks until the next change and ends once every
/// sensor feeding it has been dropped.
#[derive(Clone)]
pub struct SensorChanges {
    rx: Arc<Mutex<mpsc::Receiver<SensorChange>>>,
}

impl SensorChanges {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<SensorChange>>>) -> Self {
        Self { rx }
    }

    /// Block until a change is available, `None` once the channel is closed
    pub fn recv(&self) -> Option<SensorChange> {
        self.rx.lock().recv().ok()
    }

    pub fn try_recv(&self) -> Option<SensorChange> {
        self.rx.lock().try_recv().ok()
    }

    /// Block up to `timeout`, `None` on timeout or closed channel
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SensorChange> {
        self.wait(timeout).into_change()
    }

    /// Block up to `timeout`, telling a quiet channel apart from a closed one
    pub fn wait(&self, timeout: Duration) -> Wait {
        match self.rx.lock().recv_timeout(timeout) {
            Ok(change) => Wait::Change(change),
            Err(mpsc::RecvTimeoutError::Timeout) => Wait::Timeout,
            Err(mpsc::RecvTimeoutError::Disconnected) => Wait::Closed,
        }
    }

    /// Take every change queued right now, oldest first
    pub fn drain(&self) -> Vec<SensorChange> {
        self.rx.lock().try_iter().collect()
    }
}

impl Wait {
    fn into_change(self) -> Option<SensorChange> {
        match self {
            Wait::Change(change) => Some(change),
            Wait::Timeout | Wait::Closed => None,
        }
    }
}

impl Iterator for SensorChanges {
    type Item = SensorChange;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl std::fmt::Debug for SensorChanges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorChanges").finish_non_exhaustive()
    }
}
