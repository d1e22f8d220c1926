//! Run lifecycle state machine.
//!
//! `Pending -> GeographyResolved -> SnapshotsResolved -> Priced ->
//! Aggregated -> Finalized`, with `Failed` terminal from any non-final
//! state. No step retries automatically; a failure aborts the run and no
//! partial run is finalized.

use crate::error::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    GeographyResolved,
    SnapshotsResolved,
    Priced,
    Aggregated,
    Finalized,
    Failed,
}

impl RunState {
    fn order(&self) -> Option<u8> {
        match self {
            RunState::Pending => Some(0),
            RunState::GeographyResolved => Some(1),
            RunState::SnapshotsResolved => Some(2),
            RunState::Priced => Some(3),
            RunState::Aggregated => Some(4),
            RunState::Finalized => Some(5),
            RunState::Failed => None,
        }
    }

    /// Advance to the next state, or fail on anything but a single
    /// forward step (Failed is reachable from any non-terminal state).
    pub fn advance(self, to: RunState) -> Result<RunState> {
        let valid = match (self.order(), to.order()) {
            (Some(from), Some(next)) => next == from + 1,
            // any live state may fail; Failed and Finalized are terminal
            (Some(_), None) => self != RunState::Finalized,
            (None, _) => false,
        };
        if valid {
            Ok(to)
        } else {
            Err(OrchestratorError::InvalidTransition { from: self, to })
        }
    }
}
