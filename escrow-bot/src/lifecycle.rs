//! Service lifecycle as an explicit state machine.
//!
//! `Starting → Polling ⇄ Dispatching`, `Polling | Dispatching → Backoff → Polling | Dispatching`,
//! and `* → ShuttingDown → Stopped`. Invalid transitions are rejected and logged. The current state
//! is published on a watch channel for the liveness endpoint and tests.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Starting,
    Polling,
    Dispatching,
    Backoff,
    ShuttingDown,
    Stopped,
}

impl ServiceState {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceState::Starting => "starting",
            ServiceState::Polling => "polling",
            ServiceState::Dispatching => "dispatching",
            ServiceState::Backoff => "backoff",
            ServiceState::ShuttingDown => "shutting_down",
            ServiceState::Stopped => "stopped",
        }
    }

    pub fn can_transition_to(self, next: ServiceState) -> bool {
        use ServiceState::*;
        match (self, next) {
            (Stopped, _) => false,
            (ShuttingDown, Stopped) => true,
            (ShuttingDown, _) => false,
            (_, ShuttingDown) => true,
            (Starting, Polling) => true,
            (Polling, Dispatching | Backoff) => true,
            (Dispatching, Polling | Backoff) => true,
            (Backoff, Polling | Dispatching) => true,
            _ => false,
        }
    }

    /// Still serving: not shutting down or stopped.
    pub fn is_live(self) -> bool {
        !matches!(self, ServiceState::ShuttingDown | ServiceState::Stopped)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle on the current [`ServiceState`].
#[derive(Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<ServiceState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ServiceState::Starting);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> ServiceState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.tx.subscribe()
    }

    /// Moves to `next`. Staying in the same state is a no-op. Returns false if the move is invalid.
    pub fn transition(&self, next: ServiceState) -> bool {
        let current = self.current();
        if current == next {
            return true;
        }
        if !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "Rejected invalid service state transition");
            return false;
        }
        self.tx.send_replace(next);
        debug!(from = %current, to = %next, "Service state changed");
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
