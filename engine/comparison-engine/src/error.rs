//! Error types for comparison evaluation

use geo_resolver::GeographyError;
use run_orchestrator::OrchestratorError;
use thiserror::Error;

/// Result type alias for comparison operations
pub type Result<T> = std::result::Result<T, ComparisonError>;

#[derive(Error, Debug)]
pub enum ComparisonError {
    /// Malformed comparison request, rejected before any run executes
    #[error("validation: {0}")]
    Validation(String),

    /// The hard parity precondition failed. Evaluated before any delta
    /// math; the evaluator never substitutes or re-resolves.
    #[error("parity violation between runs {baseline_run} and {other_run}: {detail}")]
    ParityViolation {
        baseline_run: uuid::Uuid,
        other_run: uuid::Uuid,
        detail: String,
    },

    #[error("geography for entity {entity_id}: {source}")]
    Geography {
        entity_id: String,
        #[source]
        source: GeographyError,
    },

    /// A compared entity's pricing run failed; the comparison aborts.
    #[error("pricing run for entity {entity_id}: {source}")]
    RunFailed {
        entity_id: String,
        #[source]
        source: OrchestratorError,
    },
}
