//! OPPS packaging.
//!
//! Policy, not inferred intent: the conditional-packaging heuristic is
//! PLAN-scoped. `Q1/Q2/Q3` lines package only when a `J1` primary exists
//! anywhere in the same pricing request; a real claims system would
//! evaluate this per claim. `N` lines always package. Lines marked
//! distinct (-59 / X{EPSU}) are exempt from conditional packaging only.
//! A packaged line keeps `allowed_cents = 0`; the comprehensive primary
//! absorbs its payment.

use pricing_engines::{Plan, PricedLine};
use reference_data::{StatusIndicator, TraceNote, TraceStage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagingPolicy {
    /// Apply the plan-scoped J1-presence heuristic for Q1/Q2/Q3.
    /// Flagged for product review; claim-scoped evaluation is a known
    /// deviation of the source material.
    pub conditional_packaging: bool,
}

impl Default for PackagingPolicy {
    fn default() -> Self {
        Self { conditional_packaging: true }
    }
}

pub(crate) fn apply_packaging(
    policy: &PackagingPolicy,
    plan: &Plan,
    lines: &mut [PricedLine],
) -> Vec<TraceNote> {
    let mut notes = Vec::new();
    let j1_primary: Option<String> = lines
        .iter()
        .find(|l| l.status_indicator == Some(StatusIndicator::J1))
        .map(|l| l.code.clone());

    for line in lines.iter_mut() {
        let si = match &line.status_indicator {
            Some(si) => si.clone(),
            None => continue,
        };
        let distinct = plan.components[line.component_index]
            .modifiers
            .iter()
            .any(|m| m.marks_distinct());

        let package = match si {
            StatusIndicator::N => true,
            ref si if si.is_conditionally_packaged() => {
                policy.conditional_packaging && j1_primary.is_some() && !distinct
            }
            _ => false,
        };
        if !package {
            continue;
        }

        let absorbed = line.result.allowed_cents;
        line.result.allowed_cents = 0;
        line.result.packaged = true;
        let reason = match (&si, &j1_primary) {
            (StatusIndicator::N, _) => "SI N always packages".to_string(),
            (_, Some(primary)) => {
                format!("SI {si:?} conditionally packaged; J1 primary {primary} in plan")
            }
            _ => format!("SI {si:?} packaged"),
        };
        notes.push(TraceNote::new(
            TraceStage::Modifier,
            format!("{} packaged ({absorbed} absorbed): {reason}", line.code),
        ));
    }
    notes
}
