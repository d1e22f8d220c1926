//! Error types for setting pricing engines

use reference_data::{DatasetId, StoreError};
use thiserror::Error;

/// Result type alias for pricing operations
pub type Result<T> = std::result::Result<T, PricingError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    /// A required reference row is absent for this line. Fatal for the
    /// line; siblings keep pricing.
    #[error("reference row missing in {dataset} for {identifier}")]
    ReferenceDataMissing { dataset: DatasetId, identifier: String },

    /// The orchestrator never resolved a dataset this engine reads.
    #[error("dataset {0} was not resolved for this run")]
    ContextMissing(DatasetId),

    /// Strict POS mode and the component carries no resolvable POS.
    #[error("place of service required for {code}")]
    PosRequired { code: String },

    /// Malformed component for this setting.
    #[error("invalid component: {0}")]
    Validation(String),

    #[error("reference store: {0}")]
    Store(#[from] StoreError),
}
