//! Direct fee-schedule lookups: CLFS lab fees and DMEPOS equipment fees.
//! DMEPOS additionally selects the rural column from the resolved rural
//! status.

use crate::dispatch::SettingEngine;
use crate::error::{PricingError, Result};
use crate::types::{PlanComponent, PricedLine, PricingContext};
use async_trait::async_trait;
use reference_data::{Cents, DatasetId, ReferenceStore};

pub struct ClfsEngine;

impl ClfsEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClfsEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingEngine for ClfsEngine {
    async fn price(
        &self,
        component_index: usize,
        component: &PlanComponent,
        ctx: &PricingContext<'_>,
        store: &dyn ReferenceStore,
    ) -> Result<PricedLine> {
        let key = ctx.key_for(DatasetId::ClfsFees)?;
        let fee = store.get_clfs_fee(&key, &component.code).await?.ok_or_else(|| {
            PricingError::ReferenceDataMissing {
                dataset: DatasetId::ClfsFees,
                identifier: component.code.clone(),
            }
        })?;

        let mut line = PricedLine::new(component_index, component);
        line.result.allowed_cents = fee * component.units as Cents;
        line.formula = format!("CLFS: fee {fee} x {} units", component.units);
        Ok(line)
    }
}

pub struct DmeposEngine;

impl DmeposEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DmeposEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingEngine for DmeposEngine {
    async fn price(
        &self,
        component_index: usize,
        component: &PlanComponent,
        ctx: &PricingContext<'_>,
        store: &dyn ReferenceStore,
    ) -> Result<PricedLine> {
        let key = ctx.key_for(DatasetId::DmeposFees)?;
        let entry = store.get_dmepos_fee(&key, &component.code).await?.ok_or_else(|| {
            PricingError::ReferenceDataMissing {
                dataset: DatasetId::DmeposFees,
                identifier: component.code.clone(),
            }
        })?;

        let mut line = PricedLine::new(component_index, component);
        let rural = match ctx.rural {
            Some(status) => status.rural,
            None => {
                line.result
                    .warnings
                    .push("rural status unresolved; priced with non-rural fee".into());
                false
            }
        };
        let fee = if rural { entry.rural_cents } else { entry.non_rural_cents };
        line.result.allowed_cents = fee * component.units as Cents;
        line.formula = format!(
            "DMEPOS: {} fee {fee} x {} units",
            if rural { "rural" } else { "non-rural" },
            component.units
        );
        Ok(line)
    }
}
