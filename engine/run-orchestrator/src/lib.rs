// Run orchestrator - per-request pipeline, cost share, trace, aggregation

mod config;
mod cost_share;
mod error;
mod orchestrator;
mod state;
mod trace;
mod types;

pub use config::OrchestratorConfig;
pub use cost_share::apply_cost_share;
pub use error::{LineFailure, OrchestratorError, Result};
pub use orchestrator::RunOrchestrator;
pub use state::RunState;
pub use trace::TraceRecorder;
pub use types::{
    BenefitParams, MoneyDescriptor, PinnedSnapshot, PricingRequest, Run, RunTotals, RunTrace,
};
