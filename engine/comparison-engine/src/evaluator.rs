//! The comparison evaluator: parity gate, line matrix, baseline deltas,
//! and deterministic winner flags.
//!
//! Parity is a hard precondition checked before any delta math. Compared
//! runs must share the same plan, the same snapshot selection per dataset
//! (effective window and digest), and the same benefit toggles. A
//! mismatch fails closed; the evaluator never re-resolves on the caller's
//! behalf.

use crate::error::{ComparisonError, Result};
use crate::types::{ComparisonResult, EntityDelta};
use reference_data::DatasetId;
use run_orchestrator::Run;
use std::collections::BTreeMap;
use tracing::debug;

/// One compared entity's finalized run, in insertion order.
#[derive(Debug, Clone)]
pub struct ComparedRun {
    pub entity_id: String,
    pub run: Run,
}

/// Evaluate a comparison over finalized runs. The first entry is the
/// baseline.
pub fn compare(runs: &[ComparedRun]) -> Result<ComparisonResult> {
    if runs.len() < 2 {
        return Err(ComparisonError::Validation(format!(
            "comparison needs at least 2 runs, got {}",
            runs.len()
        )));
    }

    let baseline = &runs[0];
    for other in &runs[1..] {
        check_parity(baseline, other)?;
    }
    debug!(entities = runs.len(), "parity gate passed");

    // Matrix: rows = line items in plan order, columns = entities.
    let row_codes: Vec<String> =
        baseline.run.line_items.iter().map(|l| l.code.clone()).collect();
    let matrix: Vec<Vec<i64>> = (0..row_codes.len())
        .map(|row| runs.iter().map(|r| r.run.line_items[row].result.total_cents).collect())
        .collect();

    let deltas = runs
        .iter()
        .map(|r| EntityDelta {
            entity_id: r.entity_id.clone(),
            allowed_delta_cents: r.run.totals.allowed_cents - baseline.run.totals.allowed_cents,
            total_delta_cents: r.run.totals.total_cents - baseline.run.totals.total_cents,
        })
        .collect();

    // Lowest beneficiary total wins; a tie goes to the earliest entity.
    let winner = runs
        .iter()
        .enumerate()
        .min_by_key(|(index, r)| (r.run.totals.total_cents, *index))
        .map(|(index, _)| index)
        .unwrap_or(0);
    let winner_flags = (0..runs.len()).map(|i| i == winner).collect();

    Ok(ComparisonResult {
        run_ids: runs.iter().map(|r| r.run.run_id).collect(),
        parity_ok: true,
        columns: runs.iter().map(|r| r.entity_id.clone()).collect(),
        row_codes,
        matrix,
        deltas,
        winner_flags,
    })
}

fn check_parity(baseline: &ComparedRun, other: &ComparedRun) -> Result<()> {
    let violation = |detail: String| ComparisonError::ParityViolation {
        baseline_run: baseline.run.run_id,
        other_run: other.run.run_id,
        detail,
    };

    if baseline.run.inputs.plan.plan_id != other.run.inputs.plan.plan_id {
        return Err(violation(format!(
            "plan {:?} vs {:?}",
            baseline.run.inputs.plan.plan_id, other.run.inputs.plan.plan_id
        )));
    }
    if baseline.run.line_items.len() != other.run.line_items.len() {
        return Err(violation(format!(
            "{} line items vs {}",
            baseline.run.line_items.len(),
            other.run.line_items.len()
        )));
    }
    if baseline.run.trace.toggles != other.run.trace.toggles {
        return Err(violation("benefit toggles differ".into()));
    }

    let base_selections = selections(baseline);
    let other_selections = selections(other);
    for (dataset, selection) in &base_selections {
        match other_selections.get(dataset) {
            Some(theirs) if theirs == selection => {}
            Some(theirs) => {
                return Err(violation(format!(
                    "dataset {dataset} resolved to {} vs {}",
                    selection.2, theirs.2
                )));
            }
            None => return Err(violation(format!("dataset {dataset} missing from other run"))),
        }
    }
    if other_selections.len() != base_selections.len() {
        return Err(violation("dataset selections differ in coverage".into()));
    }
    Ok(())
}

type Selection = (chrono::NaiveDate, Option<chrono::NaiveDate>, String);

fn selections(run: &ComparedRun) -> BTreeMap<DatasetId, Selection> {
    run.run
        .resolved_contexts
        .iter()
        .map(|c| {
            (c.dataset_id, (c.chosen_effective_from, c.chosen_effective_to, c.digest.clone()))
        })
        .collect()
}
