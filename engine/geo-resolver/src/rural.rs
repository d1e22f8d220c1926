//! Rural status for DMEPOS pricing.
//!
//! The official rural-ZIP table is authoritative. Only on a table miss does
//! the resolver fall back to a geometric heuristic (no CBSA assignment on
//! the used locality record), and that fallback always carries a trace
//! warning.

use crate::error::Result;
use crate::resolver::ResolvedGeography;
use reference_data::{ReferenceStore, TraceNote, TraceStage};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuralStatus {
    pub rural: bool,
    /// Set when the official table had no row and the heuristic decided
    pub heuristic: bool,
    pub warnings: Vec<TraceNote>,
}

pub async fn rural_status(
    store: &dyn ReferenceStore,
    zip5: &str,
    geography: &ResolvedGeography,
) -> Result<RuralStatus> {
    if let Some(rural) = store.get_rural_flag(zip5).await? {
        return Ok(RuralStatus { rural, heuristic: false, warnings: Vec::new() });
    }

    let rural = geography.used.cbsa.is_none();
    warn!(zip5, rural, "rural table miss, used CBSA-absence heuristic");
    Ok(RuralStatus {
        rural,
        heuristic: true,
        warnings: vec![TraceNote::new(
            TraceStage::Geography,
            format!(
                "ZIP {zip5} absent from official rural table; \
                 heuristic (CBSA assignment) classified it {}",
                if rural { "rural" } else { "non-rural" }
            ),
        )],
    })
}
