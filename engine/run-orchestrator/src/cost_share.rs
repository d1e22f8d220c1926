//! Beneficiary cost share: deductible, then coinsurance, then the
//! optional out-of-pocket cap, applied in line order with integer
//! arithmetic only. Packaged lines carry no beneficiary share.

use crate::types::BenefitParams;
use pricing_engines::PricedLine;
use reference_data::{scale_cents, Cents, TraceNote, TraceStage};

pub fn apply_cost_share(benefit: &BenefitParams, lines: &mut [PricedLine]) -> Vec<TraceNote> {
    let mut notes = Vec::new();
    let mut remaining_deductible: Cents =
        (benefit.deductible_cents - benefit.deductible_met_cents).max(0);
    let mut cumulative_oop: Cents = 0;

    for line in lines.iter_mut() {
        if line.result.packaged || line.result.allowed_cents <= 0 {
            line.result.deductible_cents = 0;
            line.result.coinsurance_cents = 0;
            line.result.total_cents = 0;
            continue;
        }

        let allowed = line.result.allowed_cents;
        let mut deductible = remaining_deductible.min(allowed);
        let mut coinsurance = scale_cents(allowed - deductible, benefit.coinsurance_rate_bps);

        if let Some(cap) = benefit.oop_cap_cents {
            let headroom = (cap - cumulative_oop).max(0);
            if deductible + coinsurance > headroom {
                // Clamp coinsurance first, then deductible
                coinsurance = coinsurance.min(headroom);
                deductible = deductible.min(headroom - coinsurance);
                notes.push(TraceNote::new(
                    TraceStage::CostShare,
                    format!("{}: out-of-pocket cap {cap} reached", line.code),
                ));
            }
        }

        remaining_deductible -= deductible;
        cumulative_oop += deductible + coinsurance;

        line.result.deductible_cents = deductible;
        line.result.coinsurance_cents = coinsurance;
        line.result.total_cents = deductible + coinsurance;

        if deductible > 0 {
            notes.push(TraceNote::new(
                TraceStage::CostShare,
                format!("{}: {deductible} applied to deductible", line.code),
            ));
        }
    }
    notes
}
