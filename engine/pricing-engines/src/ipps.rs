//! IPPS inpatient pricing:
//! `drg_weight x (operating_base x wage_index + capital_base x wage_index)`.
//! No IME/DSH/outlier adjustments.

use crate::dispatch::SettingEngine;
use crate::error::{PricingError, Result};
use crate::types::{PlanComponent, PricedLine, PricingContext};
use async_trait::async_trait;
use reference_data::{Cents, DatasetId, ReferenceStore};

pub struct IppsEngine;

impl IppsEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IppsEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingEngine for IppsEngine {
    async fn price(
        &self,
        component_index: usize,
        component: &PlanComponent,
        ctx: &PricingContext<'_>,
        store: &dyn ReferenceStore,
    ) -> Result<PricedLine> {
        let weights_key = ctx.key_for(DatasetId::DrgWeights)?;
        let drg_weight = store.get_drg_weight(&weights_key, &component.code).await?.ok_or_else(
            || PricingError::ReferenceDataMissing {
                dataset: DatasetId::DrgWeights,
                identifier: component.code.clone(),
            },
        )?;

        let rates_key = ctx.key_for(DatasetId::IppsRates)?;
        let rates = store.get_ipps_rates(&rates_key).await?.ok_or(
            PricingError::ReferenceDataMissing {
                dataset: DatasetId::IppsRates,
                identifier: "base rates".into(),
            },
        )?;

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

        let adjusted = rates.operating_base_cents as f64 * wage_index
            + rates.capital_base_cents as f64 * wage_index;
        let per_case: Cents = (drg_weight * adjusted).round() as Cents;
        let allowed = per_case * component.units as Cents;

        let mut line = PricedLine::new(component_index, component);
        line.result.allowed_cents = allowed;
        line.formula = format!(
            "IPPS: DRG {} weight {:.4} x (operating {} + capital {}) x wage index {:.4} \
             (CBSA {cbsa}) x {} cases",
            component.code,
            drg_weight,
            rates.operating_base_cents,
            rates.capital_base_cents,
            wage_index,
            component.units
        );
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{contexts_for, geography, vintage};
    use crate::types::Setting;
    use reference_data::{InMemoryReferenceStore, IppsRates};

    #[tokio::test]
    async fn drg_weight_scales_wage_adjusted_bases() {
        let mut store = InMemoryReferenceStore::new();
        store.load_drg_weight(vintage(DatasetId::DrgWeights), "470", 2.0);
        store.load_ipps_rates(
            vintage(DatasetId::IppsRates),
            IppsRates { operating_base_cents: 600_000, capital_base_cents: 40_000 },
        );
        store.load_wage_index(vintage(DatasetId::WageIndex), "41860", 1.5);

        let contexts = contexts_for(Setting::Inpatient.required_datasets());
        let geography = geography();
        let ctx =
            PricingContext { contexts: &contexts, geography: &geography, rural: None, ccn: None };

        let component = PlanComponent {
            code: "470".into(),
            setting: Setting::Inpatient,
            units: 1,
            utilization_weight: 1.0,
            professional_component: false,
            facility_component: true,
            modifiers: Vec::new(),
            pos: None,
            ndc: None,
            wastage_units: None,
        };
        let line = IppsEngine::new().price(0, &component, &ctx, &store).await.unwrap();
        // 2.0 * (6000.00*1.5 + 400.00*1.5) = 2.0 * 9600.00 = 19200.00
        assert_eq!(line.result.allowed_cents, 1_920_000);
    }
}
