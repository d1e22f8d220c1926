//! Error types for snapshot resolution

use chrono::NaiveDate;
use reference_data::DatasetId;
use thiserror::Error;

/// Result type alias for snapshot resolution
pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// A pinned digest is absent from the dataset's snapshot list.
    /// Hard failure, never substituted.
    #[error("snapshot of {dataset_id} with pinned digest {digest} not found")]
    NotFound { dataset_id: DatasetId, digest: String },

    /// Selection and every recorded step-back came up empty.
    #[error(
        "no usable snapshot of {dataset_id} on or before {valuation_date} \
         after {attempts} step-back attempts"
    )]
    Exhausted { dataset_id: DatasetId, valuation_date: NaiveDate, attempts: usize },
}
