//! Comparison request and result types.

use pricing_engines::Plan;
use reference_data::{Cents, TraceNote};
use run_orchestrator::BenefitParams;
use serde::{Deserialize, Serialize};
use snapshot_resolver::Quarter;
use uuid::Uuid;

/// One compared entity. The baseline (typically the Medicare benchmark)
/// is the first entry; insertion order also breaks winner ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEntity {
    pub entity_id: String,
    pub name: Option<String>,
    /// The provider's own service ZIP, used when the comparison ZIP is
    /// unusable for this provider
    pub service_zip: String,
    pub ccn: Option<String>,
    pub payer: Option<String>,
}

/// A cross-provider comparison request. Every entity is priced against
/// the same plan, benefit parameters, and comparison ZIP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub plan: Plan,
    pub comparison_zip: String,
    pub year: i32,
    pub quarter: Option<Quarter>,
    pub benefit_params: BenefitParams,
    pub providers: Vec<ProviderEntity>,
}

/// Per-entity totals delta against the baseline entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDelta {
    pub entity_id: String,
    pub allowed_delta_cents: Cents,
    pub total_delta_cents: Cents,
}

/// Comparison output. Exists only when every compared run passed the
/// parity gate; `matrix` is rows = line items, columns = entities, cell
/// values are beneficiary `total_cents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub run_ids: Vec<Uuid>,
    pub parity_ok: bool,
    /// Entity ids in insertion order, aligned with matrix columns
    pub columns: Vec<String>,
    /// Line item codes in plan order, aligned with matrix rows
    pub row_codes: Vec<String>,
    pub matrix: Vec<Vec<Cents>>,
    pub deltas: Vec<EntityDelta>,
    /// One flag per column; the lowest total wins, ties to the earliest
    /// inserted entity
    pub winner_flags: Vec<bool>,
}

/// Per-entity geography fallback notes gathered by the driver, keyed by
/// entity insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderTrace {
    pub entity_id: String,
    pub chosen_zip: String,
    pub notes: Vec<TraceNote>,
}
