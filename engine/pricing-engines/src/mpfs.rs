//! MPFS professional pricing:
//! `(work_rvu x gpci_work + pe_rvu x gpci_pe + mp_rvu x gpci_mp) x CF`,
//! rounded to cents once, then scaled by units. The PE column (facility
//! vs non-facility) follows the resolved POS.

use crate::config::EngineConfig;
use crate::dispatch::SettingEngine;
use crate::error::{PricingError, Result};
use crate::pos::{is_facility_pos, resolve_pos};
use crate::types::{Modifier, PlanComponent, PricedLine, PricingContext};
use async_trait::async_trait;
use reference_data::{round_to_cents, Cents, DatasetId, ReferenceStore};
use tracing::debug;

pub struct MpfsEngine {
    config: EngineConfig,
}

impl MpfsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Price at an explicitly forced POS. The ASC engine uses this to
    /// price the professional portion at POS 24.
    pub(crate) async fn price_at_pos(
        &self,
        component_index: usize,
        component: &PlanComponent,
        pos: u8,
        pos_warning: Option<String>,
        ctx: &PricingContext<'_>,
        store: &dyn ReferenceStore,
    ) -> Result<PricedLine> {
        let rvu_key = ctx.key_for(DatasetId::MpfsRvu)?;
        let rvu = store.get_rvu(&rvu_key, &component.code).await?.ok_or_else(|| {
            PricingError::ReferenceDataMissing {
                dataset: DatasetId::MpfsRvu,
                identifier: component.code.clone(),
            }
        })?;

        let locality = &ctx.geography.used.locality_id;
        let gpci_key = ctx.key_for(DatasetId::Gpci)?;
        let gpci = store.get_gpci(&gpci_key, locality).await?.ok_or_else(|| {
            PricingError::ReferenceDataMissing {
                dataset: DatasetId::Gpci,
                identifier: locality.clone(),
            }
        })?;

        let cf_key = ctx.key_for(DatasetId::ConversionFactor)?;
        let cf = store.get_conversion_factor(&cf_key).await?.ok_or(
            PricingError::ReferenceDataMissing {
                dataset: DatasetId::ConversionFactor,
                identifier: "conversion factor".into(),
            },
        )?;

        let pe_rvu = if is_facility_pos(pos) { rvu.pe_facility } else { rvu.pe_nonfacility };
        let work_term = rvu.work * gpci.work;
        let pe_term = pe_rvu * gpci.pe;
        let mp_term = rvu.mp * gpci.mp;

        let per_unit = round_to_cents((work_term + pe_term + mp_term) * cf);
        let professional = round_to_cents((work_term + mp_term) * cf);
        let technical = round_to_cents(pe_term * cf);
        let allowed: Cents = per_unit * component.units as Cents;

        debug!(code = %component.code, pos, allowed, "MPFS line priced");

        let mut line = PricedLine::new(component_index, component);
        line.result.allowed_cents = allowed;
        if let Some(warning) = pos_warning {
            line.result.warnings.push(warning);
        }
        line.professional_cents = Some(professional * component.units as Cents);
        line.technical_cents = Some(technical * component.units as Cents);
        line.formula = format!(
            "MPFS: (work {:.2}x{:.3} + pe {:.2}x{:.3} + mp {:.2}x{:.3}) x CF {:.2} \
             @ POS {pos} x {} units",
            rvu.work, gpci.work, pe_rvu, gpci.pe, rvu.mp, gpci.mp, cf, component.units
        );
        Ok(line)
    }
}

#[async_trait]
impl SettingEngine for MpfsEngine {
    async fn price(
        &self,
        component_index: usize,
        component: &PlanComponent,
        ctx: &PricingContext<'_>,
        store: &dyn ReferenceStore,
    ) -> Result<PricedLine> {
        // -26 and -TC name disjoint portions; both on one line is malformed
        if component.modifiers.contains(&Modifier::Professional26)
            && component.modifiers.contains(&Modifier::TechnicalComponent)
        {
            return Err(PricingError::Validation(format!(
                "{} carries both -26 and -TC",
                component.code
            )));
        }
        let resolved = resolve_pos(component, self.config.strict_pos)?;
        self.price_at_pos(component_index, component, resolved.pos, resolved.warning, ctx, store)
            .await
    }
}
