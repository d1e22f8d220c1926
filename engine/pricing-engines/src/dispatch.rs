//! The shared pricing capability and closed dispatch over settings.

use crate::asc::AscEngine;
use crate::config::EngineConfig;
use crate::drugs::DrugEngine;
use crate::error::Result;
use crate::fee_schedule::{ClfsEngine, DmeposEngine};
use crate::ipps::IppsEngine;
use crate::mpfs::MpfsEngine;
use crate::opps::OppsEngine;
use crate::types::{PlanComponent, PricedLine, PricingContext, Setting};
use async_trait::async_trait;

/// Shared capability every setting engine implements. One variant per
/// payment setting; selection is a closed match, not open subclassing.
#[async_trait]
pub trait SettingEngine: Send + Sync {
    async fn price(
        &self,
        component_index: usize,
        component: &PlanComponent,
        ctx: &PricingContext<'_>,
        store: &dyn reference_data::ReferenceStore,
    ) -> Result<PricedLine>;
}

/// All seven engines, constructed once per orchestrator.
pub struct EngineSet {
    mpfs: MpfsEngine,
    opps: OppsEngine,
    asc: AscEngine,
    ipps: IppsEngine,
    clfs: ClfsEngine,
    dmepos: DmeposEngine,
    drugs: DrugEngine,
}

impl EngineSet {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            mpfs: MpfsEngine::new(config.clone()),
            opps: OppsEngine::new(),
            asc: AscEngine::new(config.clone()),
            ipps: IppsEngine::new(),
            clfs: ClfsEngine::new(),
            dmepos: DmeposEngine::new(),
            drugs: DrugEngine::new(),
        }
    }

    pub fn engine_for(&self, setting: Setting) -> &dyn SettingEngine {
        match setting {
            Setting::Professional => &self.mpfs,
            Setting::Outpatient => &self.opps,
            Setting::AmbulatorySurgical => &self.asc,
            Setting::Inpatient => &self.ipps,
            Setting::Lab => &self.clfs,
            Setting::DurableEquipment => &self.dmepos,
            Setting::Drug => &self.drugs,
        }
    }
}
