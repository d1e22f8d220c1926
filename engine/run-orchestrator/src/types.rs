//! Request, benefit, and run types.

use chrono::{DateTime, NaiveDate, Utc};
use geo_resolver::ResolvedGeography;
use pricing_engines::{Plan, PricedLine};
use reference_data::{Cents, DatasetId, ResolvedContext, TraceNote};
use serde::{Deserialize, Serialize};
use snapshot_resolver::Quarter;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Beneficiary benefit parameters. `toggles` participate in comparison
/// parity checks verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenefitParams {
    pub deductible_cents: Cents,
    /// Portion of the deductible already met this year
    pub deductible_met_cents: Cents,
    /// Coinsurance rate in basis points (2000 = 20%)
    pub coinsurance_rate_bps: i64,
    /// Annual out-of-pocket cap, when the benefit carries one
    pub oop_cap_cents: Option<Cents>,
    /// Named benefit toggles (e.g. post-acute options)
    pub toggles: BTreeMap<String, bool>,
}

impl Default for BenefitParams {
    fn default() -> Self {
        Self {
            deductible_cents: 25_700, // CY2025 Part B deductible
            deductible_met_cents: 0,
            coinsurance_rate_bps: 2_000,
            oop_cap_cents: None,
            toggles: BTreeMap::new(),
        }
    }
}

/// A caller-pinned snapshot digest for one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedSnapshot {
    pub dataset_id: DatasetId,
    pub digest: String,
}

/// A pricing request as handed over by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRequest {
    pub plan: Plan,
    pub zip5: String,
    pub year: i32,
    pub quarter: Option<Quarter>,
    pub pinned: Vec<PinnedSnapshot>,
    pub ccn: Option<String>,
    pub payer: Option<String>,
    pub benefit_params: BenefitParams,
}

impl PricingRequest {
    /// The valuation date every resolver works against: end of the
    /// requested quarter, or year-end when no quarter was given.
    pub fn valuation_date(&self) -> NaiveDate {
        match self.quarter {
            Some(quarter) => quarter.end(),
            None => NaiveDate::from_ymd_opt(self.year, 12, 31).unwrap_or_default(),
        }
    }

    pub fn pinned_digest_for(&self, dataset_id: DatasetId) -> Option<&str> {
        self.pinned
            .iter()
            .find(|p| p.dataset_id == dataset_id)
            .map(|p| p.digest.as_str())
    }
}

/// Money descriptor on every response; decimal renderings are derived,
/// never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyDescriptor {
    pub currency: String,
    pub scale: u8,
}

impl Default for MoneyDescriptor {
    fn default() -> Self {
        Self { currency: "USD".into(), scale: 2 }
    }
}

/// Integer-cent totals across a finalized run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub allowed_cents: Cents,
    pub deductible_cents: Cents,
    pub coinsurance_cents: Cents,
    pub total_cents: Cents,
}

/// Immutable trace assembled by the recorder: per-dataset resolution
/// detail, geography and modifier notes, formulas, and toggles, all
/// surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTrace {
    pub datasets: Vec<ResolvedContext>,
    pub notes: Vec<TraceNote>,
    pub formulas: Vec<String>,
    pub toggles: BTreeMap<String, bool>,
}

/// A finalized pricing run. Frozen once constructed; corrections require
/// a new run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub inputs: PricingRequest,
    pub money: MoneyDescriptor,
    pub geography: ResolvedGeography,
    pub resolved_contexts: Vec<ResolvedContext>,
    pub line_items: Vec<PricedLine>,
    pub totals: RunTotals,
    pub trace: RunTrace,
}
