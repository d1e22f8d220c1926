// Reference data model, storage collaborator boundary, and snapshot cache

mod cache;
mod config;
mod error;
mod retry;
mod store;
mod types;

pub use cache::SnapshotCache;
pub use config::{CacheConfig, RetryConfig};
pub use error::{Result, StoreError};
pub use retry::{fetch_with_retry, RetryingStore};
pub use store::{InMemoryReferenceStore, ReferenceStore};
pub use types::{
    round_to_cents, scale_cents, AddendumBEntry, AspPriceEntry, Cents, CrosswalkEntry, DatasetId,
    DatasetSnapshot, DmeposFeeEntry, GeographyRecord, GpciEntry, IppsRates, NadacPriceEntry,
    ResolvedContext, RvuEntry, SelectionReason, SnapshotKey, StatusIndicator, StepbackAttempt,
    StepbackGranularity, TraceNote, TraceStage, ZipDistance,
};
