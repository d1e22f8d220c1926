//! Shared domain types for versioned reference data and pricing results

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monetary amounts are always an integer count of cents.
/// Floating point is permitted only for non-currency reference factors
/// (RVUs, GPCIs, wage indices) and must be rounded to cents exactly once.
pub type Cents = i64;

/// Round a dollar amount to integer cents, half away from zero.
pub fn round_to_cents(dollars: f64) -> Cents {
    (dollars * 100.0).round() as Cents
}

/// Scale an integer cent amount by basis points, rounding half up.
/// Used for coinsurance rates and modifier multipliers so currency never
/// passes through floating point.
pub fn scale_cents(amount: Cents, bps: i64) -> Cents {
    let scaled = amount as i128 * bps as i128;
    ((scaled + 5_000) / 10_000) as Cents
}

/// Closed set of reference datasets this core resolves and prices against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatasetId {
    /// MPFS relative value units (work / PE / MP per HCPCS code)
    MpfsRvu,
    /// Geographic practice cost indices per locality
    Gpci,
    /// MPFS conversion factor
    ConversionFactor,
    /// OPPS Addendum B (APC rate + status indicator per code)
    OppsAddendumB,
    /// Hospital wage index per CBSA
    WageIndex,
    /// ASC fee schedule
    AscSchedule,
    /// IPPS operating/capital base rates
    IppsRates,
    /// DRG relative weights
    DrgWeights,
    /// Clinical lab fee schedule
    ClfsFees,
    /// DMEPOS fee schedule (rural / non-rural columns)
    DmeposFees,
    /// Part-B drug ASP pricing file
    AspPrices,
    /// NADAC retail drug acquisition costs
    NadacPrices,
    /// NDC-to-HCPCS unit crosswalk
    NdcCrosswalk,
    /// ZIP to locality/CBSA mapping
    ZipLocality,
    /// Official rural ZIP table
    RuralZips,
    /// Facility-negotiated rates keyed by CCN (provider-specific)
    FacilityRates,
}

impl DatasetId {
    /// Provider-specific datasets prefer a snapshot whose effective window
    /// covers the valuation date before falling back to step-back selection.
    pub fn is_provider_specific(&self) -> bool {
        matches!(self, DatasetId::FacilityRates)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetId::MpfsRvu => "mpfs_rvu",
            DatasetId::Gpci => "gpci",
            DatasetId::ConversionFactor => "conversion_factor",
            DatasetId::OppsAddendumB => "opps_addendum_b",
            DatasetId::WageIndex => "wage_index",
            DatasetId::AscSchedule => "asc_schedule",
            DatasetId::IppsRates => "ipps_rates",
            DatasetId::DrgWeights => "drg_weights",
            DatasetId::ClfsFees => "clfs_fees",
            DatasetId::DmeposFees => "dmepos_fees",
            DatasetId::AspPrices => "asp_prices",
            DatasetId::NadacPrices => "nadac_prices",
            DatasetId::NdcCrosswalk => "ndc_crosswalk",
            DatasetId::ZipLocality => "zip_locality",
            DatasetId::RuralZips => "rural_zips",
            DatasetId::FacilityRates => "facility_rates",
        }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, time-bounded version of a reference dataset.
///
/// Snapshots for the same dataset never have overlapping
/// `[effective_from, effective_to)` windows; `effective_to = None` means
/// open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub dataset_id: DatasetId,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub digest: String,
    pub source_url: String,
}

impl DatasetSnapshot {
    /// Whether `[effective_from, effective_to)` covers the given date.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.map_or(true, |to| date < to)
    }
}

/// Identifies the exact vintage a typed row lookup should read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub dataset_id: DatasetId,
    pub effective_from: NaiveDate,
}

/// Why the snapshot resolver chose a particular vintage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionReason {
    /// Caller pinned an exact digest
    Digest,
    /// Latest snapshot within the requested quarter
    Quarter,
    /// Latest snapshot effective on or before the valuation date
    Latest,
    /// Found only after stepping back through earlier periods
    Stepback,
}

/// One attempted step in the step-back search, recorded whether or not it
/// found a snapshot. Mandatory for trace reproducibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepbackAttempt {
    pub granularity: StepbackGranularity,
    pub attempted_bound: NaiveDate,
    pub found_effective_from: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepbackGranularity {
    PriorQuarter,
    PriorYear,
    AnyEarlier,
}

/// The chosen vintage for one dataset in one run. Never mutated after
/// creation; every pricing engine reads rows through the contained key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContext {
    pub dataset_id: DatasetId,
    pub chosen_effective_from: NaiveDate,
    pub chosen_effective_to: Option<NaiveDate>,
    pub digest: String,
    pub selection_reason: SelectionReason,
    pub stepbacks: Vec<StepbackAttempt>,
}

impl ResolvedContext {
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey { dataset_id: self.dataset_id, effective_from: self.chosen_effective_from }
    }
}

/// One ZIP-to-locality candidate. A ZIP may map to several of these
/// (MAC or county overlap); the `used` tag exists only at resolution time,
/// never in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographyRecord {
    pub zip5: String,
    pub locality_id: String,
    pub cbsa: Option<String>,
    /// Population/claim share of the ZIP attributed to this locality
    pub share: f64,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl GeographyRecord {
    pub fn effective_at(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.map_or(true, |to| date < to)
    }
}

/// A ZIP within a search radius, with its distance from the origin ZIP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZipDistance {
    pub zip5: String,
    pub distance_miles: f64,
}

/// Where in the pipeline a trace note was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceStage {
    Geography,
    Snapshot,
    Pricing,
    Modifier,
    CostShare,
    Aggregation,
}

/// A structured note surfaced verbatim in the finalized run trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceNote {
    pub stage: TraceStage,
    pub message: String,
}

impl TraceNote {
    pub fn new(stage: TraceStage, message: impl Into<String>) -> Self {
        Self { stage, message: message.into() }
    }
}

// --- Typed reference rows ---------------------------------------------------

/// MPFS relative value units for one HCPCS code. PE carries separate
/// facility and non-facility columns selected by the resolved POS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RvuEntry {
    pub work: f64,
    pub pe_facility: f64,
    pub pe_nonfacility: f64,
    pub mp: f64,
}

/// Geographic practice cost indices for one locality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpciEntry {
    pub work: f64,
    pub pe: f64,
    pub mp: f64,
}

/// OPPS Addendum B row: APC assignment, packaging signal, national rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddendumBEntry {
    pub apc: String,
    pub status_indicator: StatusIndicator,
    pub rate_cents: Cents,
}

/// OPPS status indicator subset relevant to packaging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusIndicator {
    /// Comprehensive APC primary; ancillary lines collapse into it
    J1,
    /// Always packaged
    N,
    /// Conditionally packaged
    Q1,
    Q2,
    Q3,
    /// Separately payable or otherwise out of packaging scope
    Other(String),
}

impl StatusIndicator {
    pub fn is_conditionally_packaged(&self) -> bool {
        matches!(self, StatusIndicator::Q1 | StatusIndicator::Q2 | StatusIndicator::Q3)
    }
}

/// IPPS base rates; DRG weight scales the wage-adjusted sum of both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IppsRates {
    pub operating_base_cents: Cents,
    pub capital_base_cents: Cents,
}

/// DMEPOS fee schedule row with rural and non-rural columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmeposFeeEntry {
    pub rural_cents: Cents,
    pub non_rural_cents: Cents,
}

/// Part-B drug average sales price per billing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspPriceEntry {
    pub per_unit_cents: Cents,
}

/// NADAC retail acquisition cost per NDC package unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NadacPriceEntry {
    pub per_unit_cents: Cents,
}

/// NDC package to HCPCS billing-unit conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosswalkEntry {
    pub ndc: String,
    pub hcpcs: String,
    /// HCPCS billing units contained in one NDC package unit
    pub units_per_package: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_cents_half_away_from_zero() {
        assert_eq!(round_to_cents(79.86), 7986);
        // Exact binary halves, so the half-away-from-zero behavior is
        // what gets asserted rather than decimal-literal drift
        assert_eq!(round_to_cents(0.125), 13);
        assert_eq!(round_to_cents(-0.125), -13);
        assert_eq!(round_to_cents(0.004), 0);
    }

    #[test]
    fn scale_cents_is_integer_only() {
        // 150% of an odd cent amount rounds half up
        assert_eq!(scale_cents(101, 15_000), 152);
        // 20% coinsurance
        assert_eq!(scale_cents(7986, 2_000), 1597);
        assert_eq!(scale_cents(0, 2_000), 0);
    }

    #[test]
    fn snapshot_covers_half_open_window() {
        let snap = DatasetSnapshot {
            dataset_id: DatasetId::MpfsRvu,
            effective_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            effective_to: Some(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()),
            digest: "sha256:abc".into(),
            source_url: "https://cms.gov/mpfs/2025q1".into(),
        };
        assert!(snap.covers(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        assert!(snap.covers(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()));
        assert!(!snap.covers(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()));
    }
}
