//! Error types for run orchestration

use crate::state::RunState;
use geo_resolver::GeographyError;
use pricing_engines::PricingError;
use reference_data::{DatasetId, StoreError};
use snapshot_resolver::SnapshotError;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// One line that failed pricing, with the offending identifiers and the
/// decision path the engine attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFailure {
    pub component_index: usize,
    pub code: String,
    pub error: PricingError,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    /// Malformed plan or request, rejected before resolution begins
    #[error("validation: {0}")]
    Validation(String),

    #[error("geography: {0}")]
    Geography(#[from] GeographyError),

    #[error("snapshot resolution for {dataset}: {source}")]
    Snapshot {
        dataset: DatasetId,
        #[source]
        source: SnapshotError,
    },

    #[error("reference store: {0}")]
    Store(#[from] StoreError),

    /// One or more lines failed; siblings were still evaluated, but the
    /// run cannot aggregate and is never finalized.
    #[error("{} line(s) failed pricing: {:?}", .failures.len(), .failures)]
    LinePricing { failures: Vec<LineFailure> },

    #[error("invalid run state transition {from:?} -> {to:?}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("internal: {0}")]
    Internal(String),
}
