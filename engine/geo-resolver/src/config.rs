//! Configuration for geography resolution

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Minimum share weight for a candidate to count toward ambiguity.
    /// Default 0.10 pending product sign-off.
    pub materiality_threshold: f64,

    /// Radius ladder for comparison fallback, in miles. Must be
    /// non-decreasing; expansion never exceeds the last entry.
    pub expansion_radii_miles: Vec<u32>,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self { materiality_threshold: 0.10, expansion_radii_miles: vec![25, 50, 75, 100] }
    }
}
