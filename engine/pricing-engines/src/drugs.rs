//! Drug pricing.
//!
//! Part-B allowed = ASP per unit x 1.06 x units, with the 6% add-on
//! applied in integer basis points so currency never passes through
//! floating point. Wastage units are valued and tracked but excluded from
//! the allowed amount. When the component carries an NDC, a NADAC retail
//! reference is attached, converted to HCPCS billing units through the
//! crosswalk when one exists.

use crate::dispatch::SettingEngine;
use crate::error::{PricingError, Result};
use crate::types::{PlanComponent, PricedLine, PricingContext};
use async_trait::async_trait;
use reference_data::{scale_cents, Cents, DatasetId, ReferenceStore};

/// ASP add-on: 106% in basis points
const ASP_MARKUP_BPS: i64 = 10_600;

pub struct DrugEngine;

impl DrugEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DrugEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingEngine for DrugEngine {
    async fn price(
        &self,
        component_index: usize,
        component: &PlanComponent,
        ctx: &PricingContext<'_>,
        store: &dyn ReferenceStore,
    ) -> Result<PricedLine> {
        let asp_key = ctx.key_for(DatasetId::AspPrices)?;
        let asp = store.get_asp_price(&asp_key, &component.code).await?.ok_or_else(|| {
            PricingError::ReferenceDataMissing {
                dataset: DatasetId::AspPrices,
                identifier: component.code.clone(),
            }
        })?;

        let per_unit = scale_cents(asp.per_unit_cents, ASP_MARKUP_BPS);
        let allowed: Cents = per_unit * component.units as Cents;
        let wastage_cents = per_unit * component.wastage_units.unwrap_or(0) as Cents;

        let mut line = PricedLine::new(component_index, component);
        line.result.allowed_cents = allowed;
        line.wastage_cents = wastage_cents;
        line.formula = format!(
            "Drug: ASP {} x 1.06 x {} units",
            asp.per_unit_cents, component.units
        );
        if wastage_cents > 0 {
            line.formula.push_str(&format!(
                "; wastage {} units ({wastage_cents} cents) tracked, excluded from totals",
                component.wastage_units.unwrap_or(0)
            ));
        }

        if let Some(ndc) = &component.ndc {
            line.retail_reference_cents =
                retail_reference(component, ndc, ctx, store).await?;
            if line.retail_reference_cents.is_none() {
                line.result
                    .warnings
                    .push(format!("no NADAC reference for NDC {ndc}"));
            }
        }
        Ok(line)
    }
}

/// NADAC retail reference in cents for the component's billed units, or
/// `None` when no NADAC row exists. Retail reference is informational and
/// never enters the allowed amount.
async fn retail_reference(
    component: &PlanComponent,
    ndc: &str,
    ctx: &PricingContext<'_>,
    store: &dyn ReferenceStore,
) -> Result<Option<Cents>> {
    let nadac_key = ctx.key_for(DatasetId::NadacPrices)?;
    let nadac = match store.get_nadac_price(&nadac_key, ndc).await? {
        Some(entry) => entry,
        None => return Ok(None),
    };

    let crosswalk_key = ctx.key_for(DatasetId::NdcCrosswalk)?;
    let package_units = match store.get_crosswalk(&crosswalk_key, ndc).await? {
        Some(xw) if xw.units_per_package > 0.0 => {
            component.units as f64 / xw.units_per_package
        }
        _ => component.units as f64,
    };
    Ok(Some((nadac.per_unit_cents as f64 * package_units).round() as Cents))
}
