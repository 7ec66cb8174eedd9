//! Worker lifecycle states.
//!
//! `Parsed → Installing → Installed → Activating → Activated`, with
//! `Redundant` reachable from installing (failed install) and from any
//! later state when superseded.

use std::fmt;

use crate::shared::error::SyncError;

/// Lifecycle state of the cache worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Parsed,
    Installing,
    /// Installed and waiting to activate
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installed, Activating)
                | (Activating, Activated)
                | (Installing | Installed | Activating | Activated, Redundant)
        )
    }

    /// Validated transition
    pub fn transition(self, next: WorkerState) -> Result<WorkerState, SyncError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SyncError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Whether the worker controls fetches
    pub fn is_active(self) -> bool {
        self == WorkerState::Activated
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        f.write_str(name)
    }
}
