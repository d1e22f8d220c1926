//! Error types for geography resolution

use reference_data::StoreError;
use thiserror::Error;

/// Result type alias for geography resolution
pub type Result<T> = std::result::Result<T, GeographyError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeographyError {
    /// No usable ZIP found, even after fallback and radius expansion.
    #[error("no usable geography for ZIP {zip5}: {attempted}")]
    Unresolvable { zip5: String, attempted: String },

    /// Malformed ZIP input, rejected before any lookup.
    #[error("invalid ZIP code: {0:?}")]
    InvalidZip(String),

    #[error("geography store: {0}")]
    Store(#[from] StoreError),
}
