//! Worker lifecycle state machine.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }

    fn can_move_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Activating)
                | (Installed, Redundant)
                | (Activating, Activated)
                | (Activating, Redundant)
                | (Activated, Redundant)
        )
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("invalid lifecycle transition {from:?} -> {to:?}")]
    InvalidTransition { from: WorkerState, to: WorkerState },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LifecycleSnapshot {
    pub state: WorkerState,
    pub skip_waiting: bool,
    pub controlling: bool,
    pub changed_at: DateTime<Utc>,
}

/// Current lifecycle position of the worker.
#[derive(Debug)]
pub struct Lifecycle {
    inner: RwLock<LifecycleSnapshot>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LifecycleSnapshot {
                state: WorkerState::Parsed,
                skip_waiting: false,
                controlling: false,
                changed_at: Utc::now(),
            }),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.inner.read().state
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        *self.inner.read()
    }

    /// Intercepts only once activated and in control of clients.
    pub fn is_intercepting(&self) -> bool {
        let inner = self.inner.read();
        inner.state == WorkerState::Activated && inner.controlling
    }

    pub fn transition(&self, next: WorkerState) -> Result<(), LifecycleError> {
        let mut inner = self.inner.write();
        let from = inner.state;
        if !from.can_move_to(next) {
            return Err(LifecycleError::InvalidTransition { from, to: next });
        }
        inner.state = next;
        inner.changed_at = Utc::now();
        if next == WorkerState::Redundant {
            inner.controlling = false;
        }
        drop(inner);

        info!(component = "lifecycle", event = "transition", from = from.as_str(), to = next.as_str(), "worker state changed");
        Ok(())
    }

    pub fn request_skip_waiting(&self) {
        self.inner.write().skip_waiting = true;
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.inner.read().skip_waiting
    }

    /// Takes control of clients. Only meaningful once activated.
    pub fn claim(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.state != WorkerState::Activated {
            return false;
        }
        inner.controlling = true;
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
