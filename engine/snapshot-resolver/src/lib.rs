// Snapshot resolver - deterministic dataset vintage selection

mod error;
mod quarter;
mod resolver;

pub use error::{Result, SnapshotError};
pub use quarter::Quarter;
pub use resolver::{resolve, SnapshotRequest};
