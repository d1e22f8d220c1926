//! Error types for reference-data access

use thiserror::Error;

/// Result type alias for storage collaborator operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the storage collaborator boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Collaborator did not answer within the per-fetch timeout budget
    #[error("upstream fetch timed out: {context}")]
    Timeout { context: String },

    /// Collaborator kept failing after the bounded retry schedule
    #[error("upstream unavailable after {attempts} attempts: {context}")]
    UpstreamUnavailable { attempts: u32, context: String },

    /// Row exists but cannot be interpreted
    #[error("corrupt reference row: {0}")]
    Corrupt(String),
}
