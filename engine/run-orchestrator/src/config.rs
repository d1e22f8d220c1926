//! Orchestrator configuration: bundles the sub-component configs so one
//! injected struct configures a whole pricing stack.

use geo_resolver::GeoConfig;
use pricing_engines::EngineConfig;
use reference_data::{CacheConfig, RetryConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub engines: EngineConfig,
    pub geo: GeoConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
}
