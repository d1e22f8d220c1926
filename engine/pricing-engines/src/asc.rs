//! ASC pricing: facility rate from the ASC schedule, with the
//! professional portion priced through the MPFS engine at POS 24 when the
//! component carries one.

use crate::config::EngineConfig;
use crate::dispatch::SettingEngine;
use crate::error::{PricingError, Result};
use crate::mpfs::MpfsEngine;
use crate::pos::POS_ASC;
use crate::types::{PlanComponent, PricedLine, PricingContext};
use async_trait::async_trait;
use reference_data::{Cents, DatasetId, ReferenceStore};

pub struct AscEngine {
    mpfs: MpfsEngine,
}

impl AscEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { mpfs: MpfsEngine::new(config) }
    }
}

#[async_trait]
impl SettingEngine for AscEngine {
    async fn price(
        &self,
        component_index: usize,
        component: &PlanComponent,
        ctx: &PricingContext<'_>,
        store: &dyn ReferenceStore,
    ) -> Result<PricedLine> {
        let asc_key = ctx.key_for(DatasetId::AscSchedule)?;
        let fee = store.get_asc_fee(&asc_key, &component.code).await?.ok_or_else(|| {
            PricingError::ReferenceDataMissing {
                dataset: DatasetId::AscSchedule,
                identifier: component.code.clone(),
            }
        })?;
        let facility: Cents = fee * component.units as Cents;

        let mut line = PricedLine::new(component_index, component);
        line.result.allowed_cents = facility;
        line.formula =
            format!("ASC: schedule rate {fee} x {} units", component.units);

        if component.professional_component {
            let professional = self
                .mpfs
                .price_at_pos(component_index, component, POS_ASC, None, ctx, store)
                .await?;
            line.result.allowed_cents += professional.result.allowed_cents;
            line.professional_cents = Some(professional.result.allowed_cents);
            line.formula.push_str(&format!(
                " + professional via MPFS @ POS {POS_ASC} [{}]",
                professional.formula
            ));
        }
        Ok(line)
    }
}
