//! Cross-line adjustment pass, applied after base engine computation and
//! before cost share and aggregation.
//!
//! Order matters: -26/-TC substitution first, then -50 bilateral scaling
//! (before multiple-procedure ranking, per the payment rule), then -51
//! discounting through the pluggable ranking, then OPPS packaging once
//! every line of the plan is visible.

use crate::packaging::{apply_packaging, PackagingPolicy};
use crate::ranking::{discount_bps, ProcedureRanking, StandardRanking};
use pricing_engines::{Modifier, Plan, PricedLine};
use reference_data::{scale_cents, TraceNote, TraceStage};
use tracing::debug;

pub struct ModifierProcessor {
    ranking: Box<dyn ProcedureRanking>,
    packaging: PackagingPolicy,
}

impl ModifierProcessor {
    pub fn new() -> Self {
        Self { ranking: Box::new(StandardRanking), packaging: PackagingPolicy::default() }
    }

    /// Substitute the ranking strategy (e.g. a family-specific rule table).
    pub fn with_ranking(ranking: Box<dyn ProcedureRanking>) -> Self {
        Self { ranking, packaging: PackagingPolicy::default() }
    }

    /// Apply every cross-line adjustment in order. Returns the trace notes
    /// the adjustments emitted.
    pub fn apply(&self, plan: &Plan, lines: &mut [PricedLine]) -> Vec<TraceNote> {
        let mut notes = Vec::new();

        // -26 / -TC: substitute the split portion for the global amount
        for line in lines.iter_mut() {
            let modifiers = &plan.components[line.component_index].modifiers;
            if modifiers.contains(&Modifier::Professional26) {
                if let Some(professional) = line.professional_cents {
                    line.result.allowed_cents = professional;
                    notes.push(TraceNote::new(
                        TraceStage::Modifier,
                        format!("{} -26: professional portion {professional}", line.code),
                    ));
                } else {
                    line.result
                        .warnings
                        .push("-26 present but line has no professional split".into());
                }
            } else if modifiers.contains(&Modifier::TechnicalComponent) {
                if let Some(technical) = line.technical_cents {
                    line.result.allowed_cents = technical;
                    notes.push(TraceNote::new(
                        TraceStage::Modifier,
                        format!("{} -TC: technical portion {technical}", line.code),
                    ));
                } else {
                    line.result
                        .warnings
                        .push("-TC present but line has no technical split".into());
                }
            }
        }

        // -50 bilateral: 150% of the unilateral amount, before ranking
        for line in lines.iter_mut() {
            let modifiers = &plan.components[line.component_index].modifiers;
            if modifiers.contains(&Modifier::Bilateral) {
                let unilateral = line.result.allowed_cents;
                line.result.allowed_cents = scale_cents(unilateral, 15_000);
                notes.push(TraceNote::new(
                    TraceStage::Modifier,
                    format!(
                        "{} -50 bilateral: {unilateral} -> {}",
                        line.code, line.result.allowed_cents
                    ),
                ));
            }
        }

        // -51 multiple-procedure discounting over the ranked order
        let discounted: Vec<(usize, i64)> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| {
                plan.components[line.component_index]
                    .modifiers
                    .contains(&Modifier::MultipleProcedure)
            })
            .map(|(pos, line)| (pos, line.result.allowed_cents))
            .collect();
        if !discounted.is_empty() {
            let order = self.ranking.rank(&discounted);
            for (rank, pos) in order.into_iter().enumerate() {
                let bps = discount_bps(rank);
                if bps == 10_000 {
                    continue;
                }
                let line = &mut lines[pos];
                let before = line.result.allowed_cents;
                line.result.allowed_cents = scale_cents(before, bps);
                notes.push(TraceNote::new(
                    TraceStage::Modifier,
                    format!(
                        "{} -51 rank {rank}: {before} -> {} ({bps} bps)",
                        line.code, line.result.allowed_cents
                    ),
                ));
            }
        }

        // OPPS packaging runs last, with the whole plan visible
        notes.extend(apply_packaging(&self.packaging, plan, lines));

        debug!(notes = notes.len(), "modifier pass complete");
        notes
    }
}

impl Default for ModifierProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricing_engines::{LineItemResult, PlanComponent, Setting};

    fn component(code: &str, modifiers: Vec<Modifier>) -> PlanComponent {
        PlanComponent {
            code: code.into(),
            setting: Setting::Professional,
            units: 1,
            utilization_weight: 1.0,
            professional_component: true,
            facility_component: false,
            modifiers,
            pos: None,
            ndc: None,
            wastage_units: None,
        }
    }

    fn line(index: usize, component: &PlanComponent, allowed: i64) -> PricedLine {
        let mut line = PricedLine::new(index, component);
        line.result = LineItemResult { allowed_cents: allowed, ..Default::default() };
        line
    }

    #[test]
    fn bilateral_scales_before_ranking() {
        // The -50 line's unilateral 6000 becomes 9000, which outranks the
        // 8000 line, so the 8000 line takes the 50% discount.
        let plan = Plan {
            plan_id: "plan-1".into(),
            components: vec![
                component("29881", vec![Modifier::Bilateral, Modifier::MultipleProcedure]),
                component("29880", vec![Modifier::MultipleProcedure]),
            ],
        };
        let mut lines = vec![
            line(0, &plan.components[0], 6_000),
            line(1, &plan.components[1], 8_000),
        ];

        ModifierProcessor::new().apply(&plan, &mut lines);
        assert_eq!(lines[0].result.allowed_cents, 9_000);
        assert_eq!(lines[1].result.allowed_cents, 4_000);
    }

    #[test]
    fn professional_substitution() {
        let plan = Plan {
            plan_id: "plan-1".into(),
            components: vec![component("71046", vec![Modifier::Professional26])],
        };
        let mut lines = vec![line(0, &plan.components[0], 5_000)];
        lines[0].professional_cents = Some(1_200);
        lines[0].technical_cents = Some(3_800);

        ModifierProcessor::new().apply(&plan, &mut lines);
        assert_eq!(lines[0].result.allowed_cents, 1_200);
    }

    #[test]
    fn technical_substitution_without_split_warns() {
        let plan = Plan {
            plan_id: "plan-1".into(),
            components: vec![component("80053", vec![Modifier::TechnicalComponent])],
        };
        let mut lines = vec![line(0, &plan.components[0], 5_000)];

        ModifierProcessor::new().apply(&plan, &mut lines);
        assert_eq!(lines[0].result.allowed_cents, 5_000);
        assert_eq!(lines[0].result.warnings.len(), 1);
    }

    #[test]
    fn lines_without_modifier_are_untouched() {
        let plan = Plan {
            plan_id: "plan-1".into(),
            components: vec![component("99213", Vec::new())],
        };
        let mut lines = vec![line(0, &plan.components[0], 7_986)];
        let notes = ModifierProcessor::new().apply(&plan, &mut lines);
        assert_eq!(lines[0].result.allowed_cents, 7_986);
        assert!(notes.is_empty());
    }
}
