// Modifier & packaging processor - cross-line adjustments before aggregation

mod packaging;
mod processor;
mod ranking;

pub use packaging::PackagingPolicy;
pub use processor::ModifierProcessor;
pub use ranking::{discount_bps, ProcedureRanking, StandardRanking};
