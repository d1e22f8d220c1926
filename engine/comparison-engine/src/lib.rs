// Comparison engine - parity-gated cross-provider evaluation

mod driver;
mod error;
mod evaluator;
mod types;

pub use driver::{ComparisonEngine, ComparisonOutcome};
pub use error::{ComparisonError, Result};
pub use evaluator::{compare, ComparedRun};
pub use types::{ComparisonRequest, ComparisonResult, EntityDelta, ProviderEntity, ProviderTrace};
