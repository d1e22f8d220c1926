//! Configuration for the setting engines

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// When true, a component with no explicit or inferable place of
    /// service fails with `PosRequired` instead of defaulting to facility.
    pub strict_pos: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { strict_pos: false }
    }
}
