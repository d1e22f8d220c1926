//! Plan, component, and line-item types shared by every setting engine.

use geo_resolver::{ResolvedGeography, RuralStatus};
use reference_data::{Cents, DatasetId, ResolvedContext, SnapshotKey, StatusIndicator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PricingError, Result};

/// Payment setting a component is priced under. Closed set; adding a
/// setting is an explicit enum + engine addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Setting {
    /// Professional services under MPFS
    Professional,
    /// Hospital outpatient under OPPS
    Outpatient,
    /// Ambulatory surgical center
    AmbulatorySurgical,
    /// Hospital inpatient under IPPS
    Inpatient,
    /// Clinical lab fee schedule
    Lab,
    /// DMEPOS fee schedule
    DurableEquipment,
    /// Part-B drugs (ASP) with NADAC retail reference
    Drug,
}

impl Setting {
    /// Reference datasets a component in this setting reads during pricing.
    pub fn required_datasets(&self) -> &'static [DatasetId] {
        match self {
            Setting::Professional => {
                &[DatasetId::MpfsRvu, DatasetId::Gpci, DatasetId::ConversionFactor]
            }
            Setting::Outpatient => &[DatasetId::OppsAddendumB, DatasetId::WageIndex],
            Setting::AmbulatorySurgical => &[
                DatasetId::AscSchedule,
                DatasetId::MpfsRvu,
                DatasetId::Gpci,
                DatasetId::ConversionFactor,
            ],
            Setting::Inpatient => {
                &[DatasetId::IppsRates, DatasetId::DrgWeights, DatasetId::WageIndex]
            }
            Setting::Lab => &[DatasetId::ClfsFees],
            Setting::DurableEquipment => &[DatasetId::DmeposFees, DatasetId::RuralZips],
            Setting::Drug => {
                &[DatasetId::AspPrices, DatasetId::NadacPrices, DatasetId::NdcCrosswalk]
            }
        }
    }
}

/// Recognized pricing modifiers. The documented subset only; anything else
/// is rejected at plan validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modifier {
    /// -26 professional component
    Professional26,
    /// -TC technical component
    TechnicalComponent,
    /// -50 bilateral procedure
    Bilateral,
    /// -51 multiple procedure
    MultipleProcedure,
    /// -59 distinct procedural service
    Distinct59,
    XE,
    XP,
    XS,
    XU,
}

impl Modifier {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "26" => Some(Modifier::Professional26),
            "TC" => Some(Modifier::TechnicalComponent),
            "50" => Some(Modifier::Bilateral),
            "51" => Some(Modifier::MultipleProcedure),
            "59" => Some(Modifier::Distinct59),
            "XE" => Some(Modifier::XE),
            "XP" => Some(Modifier::XP),
            "XS" => Some(Modifier::XS),
            "XU" => Some(Modifier::XU),
            _ => None,
        }
    }

    /// -59 and the X{EPSU} family mark a line distinct for packaging only.
    pub fn marks_distinct(&self) -> bool {
        matches!(
            self,
            Modifier::Distinct59 | Modifier::XE | Modifier::XP | Modifier::XS | Modifier::XU
        )
    }
}

/// One line item of a treatment plan. Owned exclusively by its [`Plan`];
/// immutable once a run references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanComponent {
    /// HCPCS/CPT code, or DRG for inpatient components
    pub code: String,
    pub setting: Setting,
    pub units: u32,
    /// Expected annual utilization, surfaced in the trace and comparisons
    pub utilization_weight: f64,
    pub professional_component: bool,
    pub facility_component: bool,
    pub modifiers: Vec<Modifier>,
    /// Explicit place of service, when the plan author knows it
    pub pos: Option<u8>,
    pub ndc: Option<String>,
    /// Discarded drug units, tracked but excluded from totals
    pub wastage_units: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub components: Vec<PlanComponent>,
}

/// Money outcome for one line. All fields are integer cents; cost-share
/// fields are zero until the beneficiary calculator runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemResult {
    pub allowed_cents: Cents,
    pub deductible_cents: Cents,
    pub coinsurance_cents: Cents,
    /// Beneficiary responsibility: deductible + coinsurance
    pub total_cents: Cents,
    pub packaged: bool,
    pub warnings: Vec<String>,
}

/// A priced line with everything downstream passes need: the modifier
/// processor reads the split amounts and status indicator, the trace
/// records the formula verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedLine {
    pub component_index: usize,
    pub code: String,
    pub setting: Setting,
    pub result: LineItemResult,
    /// OPPS packaging signal, when the setting carries one
    pub status_indicator: Option<StatusIndicator>,
    /// MPFS professional portion (work + MP), for -26 substitution
    pub professional_cents: Option<Cents>,
    /// MPFS technical portion (PE), for -TC substitution
    pub technical_cents: Option<Cents>,
    /// Discarded drug value, excluded from allowed
    pub wastage_cents: Cents,
    /// NADAC retail reference, informational only
    pub retail_reference_cents: Option<Cents>,
    /// Human-readable formula applied, surfaced verbatim in the trace
    pub formula: String,
}

impl PricedLine {
    pub fn new(component_index: usize, component: &PlanComponent) -> Self {
        Self {
            component_index,
            code: component.code.clone(),
            setting: component.setting,
            result: LineItemResult::default(),
            status_indicator: None,
            professional_cents: None,
            technical_cents: None,
            wastage_cents: 0,
            retail_reference_cents: None,
            formula: String::new(),
        }
    }
}

/// Everything a setting engine may read: the vintages the snapshot
/// resolver chose, the resolved geography, rural status, and the facility
/// identifier when the caller supplied one. Never mutated during pricing.
#[derive(Debug, Clone)]
pub struct PricingContext<'a> {
    pub contexts: &'a BTreeMap<DatasetId, ResolvedContext>,
    pub geography: &'a ResolvedGeography,
    pub rural: Option<&'a RuralStatus>,
    pub ccn: Option<&'a str>,
}

impl PricingContext<'_> {
    /// Vintage key for a dataset, or `ContextMissing` when the orchestrator
    /// never resolved it for this run.
    pub fn key_for(&self, dataset_id: DatasetId) -> Result<SnapshotKey> {
        self.contexts
            .get(&dataset_id)
            .map(ResolvedContext::key)
            .ok_or(PricingError::ContextMissing(dataset_id))
    }
}
