//! OPPS outpatient pricing: Addendum-B rate x wage-index multiplier.
//!
//! The wage index joins CCN -> CBSA when the caller supplied a facility,
//! otherwise it falls back to the resolved geography's CBSA. Packaging
//! signals (status indicators) are surfaced on the line; the plan-scoped
//! packaging pass itself lives in the modifier processor, because the
//! J1-presence heuristic needs every line visible.

use crate::dispatch::SettingEngine;
use crate::error::{PricingError, Result};
use crate::types::{PlanComponent, PricedLine, PricingContext};
use async_trait::async_trait;
use reference_data::{Cents, DatasetId, ReferenceStore};
use tracing::debug;

pub struct OppsEngine;

impl OppsEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OppsEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingEngine for OppsEngine {
    async fn price(
        &self,
        component_index: usize,
        component: &PlanComponent,
        ctx: &PricingContext<'_>,
        store: &dyn ReferenceStore,
    ) -> Result<PricedLine> {
        let addb_key = ctx.key_for(DatasetId::OppsAddendumB)?;
        let entry = store.get_addendum_b(&addb_key, &component.code).await?.ok_or_else(|| {
            PricingError::ReferenceDataMissing {
                dataset: DatasetId::OppsAddendumB,
                identifier: component.code.clone(),
            }
        })?;

        // CCN -> CBSA join, falling back to the resolved geography
        let cbsa = match ctx.ccn {
            Some(ccn) => store.get_cbsa_for_ccn(ccn).await?.or_else(|| ctx.geography.used.cbsa.clone()),
            None => ctx.geography.used.cbsa.clone(),
        }
        .ok_or_else(|| PricingError::ReferenceDataMissing {
            dataset: DatasetId::WageIndex,
            identifier: format!("no CBSA for ZIP {}", ctx.geography.used.zip5),
        })?;

        let wage_key = ctx.key_for(DatasetId::WageIndex)?;
        let wage_index = store.get_wage_index(&wage_key, &cbsa).await?.ok_or_else(|| {
            PricingError::ReferenceDataMissing {
                dataset: DatasetId::WageIndex,
                identifier: cbsa.clone(),
            }
        })?;

        let per_unit: Cents = (entry.rate_cents as f64 * wage_index).round() as Cents;
        let allowed = per_unit * component.units as Cents;
        debug!(code = %component.code, apc = %entry.apc, allowed, "OPPS line priced");

        let mut line = PricedLine::new(component_index, component);
        line.result.allowed_cents = allowed;
        line.status_indicator = Some(entry.status_indicator.clone());
        line.formula = format!(
            "OPPS: Addendum-B APC {} rate {} x wage index {:.4} (CBSA {cbsa}) x {} units, SI {:?}",
            entry.apc, entry.rate_cents, wage_index, component.units, entry.status_indicator
        );
        Ok(line)
    }
}
