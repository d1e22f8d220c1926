//! Deterministic selection of the exact dataset vintage a run prices
//! against.
//!
//! Selection is ordered, first match wins: pinned digest, requested quarter,
//! latest on or before the valuation date, then recorded step-back (prior
//! quarter, prior year, nearest earlier of any granularity). Provider-specific
//! datasets first prefer a snapshot whose effective window covers the
//! valuation date. Every resolution records its reason and the full step-back
//! path; this is never elided, even on success.

use crate::error::{Result, SnapshotError};
use crate::quarter::Quarter;
use chrono::{Datelike, NaiveDate};
use reference_data::{
    DatasetId, DatasetSnapshot, ResolvedContext, SelectionReason, StepbackAttempt,
    StepbackGranularity,
};
use tracing::debug;

/// What the caller pinned, if anything, for one dataset resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub quarter: Option<Quarter>,
    pub pinned_digest: Option<String>,
}

/// Resolve one dataset to its exact vintage for `valuation_date`.
///
/// `snapshots` is the full published list for `dataset_id`, in any order.
pub fn resolve(
    dataset_id: DatasetId,
    snapshots: &[DatasetSnapshot],
    valuation_date: NaiveDate,
    request: &SnapshotRequest,
) -> Result<ResolvedContext> {
    let mut ordered: Vec<&DatasetSnapshot> = snapshots.iter().collect();
    ordered.sort_by_key(|s| s.effective_from);

    // 1. Pinned digest: exact match or hard failure, no substitution.
    if let Some(digest) = &request.pinned_digest {
        return match ordered.iter().find(|s| &s.digest == digest) {
            Some(snap) => Ok(context(snap, SelectionReason::Digest, Vec::new())),
            None => Err(SnapshotError::NotFound {
                dataset_id,
                digest: digest.clone(),
            }),
        };
    }

    // Provider-specific datasets prefer a window covering the valuation date.
    if dataset_id.is_provider_specific() {
        if let Some(snap) = ordered.iter().rev().find(|s| s.covers(valuation_date)) {
            debug!(dataset = %dataset_id, chosen = %snap.effective_from, "covering window selected");
            return Ok(context(snap, SelectionReason::Latest, Vec::new()));
        }
    }

    // 2. Requested quarter: latest snapshot published within it.
    if let Some(quarter) = request.quarter {
        if let Some(snap) = latest_in(&ordered, quarter.start(), quarter.end()) {
            return Ok(context(snap, SelectionReason::Quarter, Vec::new()));
        }
        return step_back(dataset_id, &ordered, valuation_date, Some(quarter));
    }

    // 3. Latest snapshot effective on or before the valuation date.
    if let Some(snap) = latest_not_after(&ordered, valuation_date) {
        return Ok(context(snap, SelectionReason::Latest, Vec::new()));
    }
    step_back(dataset_id, &ordered, valuation_date, None)
}

/// Ordered step-back search, recording every attempt whether it found a
/// snapshot or not. Each recorded bound strictly decreases in recency.
fn step_back(
    dataset_id: DatasetId,
    ordered: &[&DatasetSnapshot],
    valuation_date: NaiveDate,
    quarter: Option<Quarter>,
) -> Result<ResolvedContext> {
    let mut attempts = Vec::new();
    let bound = quarter.map(|q| q.end()).unwrap_or(valuation_date);

    // Prior quarter window
    let prior_q = quarter
        .map(|q| q.prev())
        .unwrap_or_else(|| quarter_of(valuation_date).prev());
    let found = latest_in(ordered, prior_q.start(), prior_q.end());
    attempts.push(StepbackAttempt {
        granularity: StepbackGranularity::PriorQuarter,
        attempted_bound: prior_q.end(),
        found_effective_from: found.map(|s| s.effective_from),
    });
    if let Some(snap) = found {
        return Ok(context(snap, SelectionReason::Stepback, attempts));
    }

    // Prior calendar year
    let prior_year = bound.year() - 1;
    let year_start = NaiveDate::from_ymd_opt(prior_year, 1, 1).unwrap_or_default();
    let year_end = NaiveDate::from_ymd_opt(prior_year, 12, 31).unwrap_or_default();
    let found = latest_in(ordered, year_start, year_end);
    attempts.push(StepbackAttempt {
        granularity: StepbackGranularity::PriorYear,
        attempted_bound: year_end,
        found_effective_from: found.map(|s| s.effective_from),
    });
    if let Some(snap) = found {
        return Ok(context(snap, SelectionReason::Stepback, attempts));
    }

    // Nearest earlier snapshot of any granularity
    let found = latest_not_after(ordered, bound);
    attempts.push(StepbackAttempt {
        granularity: StepbackGranularity::AnyEarlier,
        attempted_bound: bound,
        found_effective_from: found.map(|s| s.effective_from),
    });
    match found {
        Some(snap) => Ok(context(snap, SelectionReason::Stepback, attempts)),
        None => Err(SnapshotError::Exhausted {
            dataset_id,
            valuation_date,
            attempts: attempts.len(),
        }),
    }
}

fn latest_in<'a>(
    ordered: &[&'a DatasetSnapshot],
    start: NaiveDate,
    end: NaiveDate,
) -> Option<&'a DatasetSnapshot> {
    ordered
        .iter()
        .rev()
        .find(|s| start <= s.effective_from && s.effective_from <= end)
        .copied()
}

fn latest_not_after<'a>(
    ordered: &[&'a DatasetSnapshot],
    bound: NaiveDate,
) -> Option<&'a DatasetSnapshot> {
    ordered.iter().rev().find(|s| s.effective_from <= bound).copied()
}

fn quarter_of(date: NaiveDate) -> Quarter {
    Quarter { year: date.year(), quarter: ((date.month0() / 3) + 1) as u8 }
}

fn context(
    snap: &DatasetSnapshot,
    selection_reason: SelectionReason,
    stepbacks: Vec<StepbackAttempt>,
) -> ResolvedContext {
    ResolvedContext {
        dataset_id: snap.dataset_id,
        chosen_effective_from: snap.effective_from,
        chosen_effective_to: snap.effective_to,
        digest: snap.digest.clone(),
        selection_reason,
        stepbacks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn snap(dataset_id: DatasetId, from: NaiveDate, to: Option<NaiveDate>) -> DatasetSnapshot {
        DatasetSnapshot {
            dataset_id,
            effective_from: from,
            effective_to: to,
            digest: format!("sha256:{}:{from}", dataset_id),
            source_url: format!("https://cms.gov/{dataset_id}"),
        }
    }

    fn mpfs_quarters() -> Vec<DatasetSnapshot> {
        vec![
            snap(DatasetId::MpfsRvu, date(2025, 1, 1), Some(date(2025, 4, 1))),
            snap(DatasetId::MpfsRvu, date(2025, 4, 1), Some(date(2025, 7, 1))),
            snap(DatasetId::MpfsRvu, date(2025, 7, 1), Some(date(2025, 10, 1))),
        ]
    }

    #[test]
    fn pinned_digest_wins() {
        let snaps = mpfs_quarters();
        let request = SnapshotRequest {
            quarter: Quarter::new(2025, 3),
            pinned_digest: Some(snaps[0].digest.clone()),
        };
        let ctx = resolve(DatasetId::MpfsRvu, &snaps, date(2025, 12, 31), &request).unwrap();
        assert_eq!(ctx.selection_reason, SelectionReason::Digest);
        assert_eq!(ctx.chosen_effective_from, date(2025, 1, 1));
        assert!(ctx.stepbacks.is_empty());
    }

    #[test]
    fn missing_pinned_digest_is_a_hard_failure() {
        let snaps = mpfs_quarters();
        let request = SnapshotRequest {
            quarter: None,
            pinned_digest: Some("sha256:missing".into()),
        };
        let err = resolve(DatasetId::MpfsRvu, &snaps, date(2025, 12, 31), &request).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::NotFound {
                dataset_id: DatasetId::MpfsRvu,
                digest: "sha256:missing".into()
            }
        );
    }

    #[test]
    fn quarter_selects_latest_within_it() {
        let snaps = mpfs_quarters();
        let request = SnapshotRequest { quarter: Quarter::new(2025, 3), pinned_digest: None };
        let ctx = resolve(DatasetId::MpfsRvu, &snaps, date(2025, 12, 31), &request).unwrap();
        assert_eq!(ctx.selection_reason, SelectionReason::Quarter);
        assert_eq!(ctx.chosen_effective_from, date(2025, 7, 1));
    }

    #[test]
    fn latest_not_after_valuation_date() {
        let snaps = mpfs_quarters();
        let request = SnapshotRequest::default();
        let ctx = resolve(DatasetId::MpfsRvu, &snaps, date(2025, 5, 15), &request).unwrap();
        assert_eq!(ctx.selection_reason, SelectionReason::Latest);
        assert_eq!(ctx.chosen_effective_from, date(2025, 4, 1));
    }

    #[test]
    fn empty_quarter_steps_back_to_prior_quarter() {
        // Nothing published in Q4; Q3 snapshot should be found via step-back
        let snaps = mpfs_quarters();
        let request = SnapshotRequest { quarter: Quarter::new(2025, 4), pinned_digest: None };
        let ctx = resolve(DatasetId::MpfsRvu, &snaps, date(2025, 12, 31), &request).unwrap();
        assert_eq!(ctx.selection_reason, SelectionReason::Stepback);
        assert_eq!(ctx.chosen_effective_from, date(2025, 7, 1));
        assert_eq!(ctx.stepbacks.len(), 1);
        assert_eq!(ctx.stepbacks[0].granularity, StepbackGranularity::PriorQuarter);
        assert_eq!(ctx.stepbacks[0].found_effective_from, Some(date(2025, 7, 1)));
    }

    #[test]
    fn stepback_reaches_prior_year() {
        let snaps = vec![snap(DatasetId::Gpci, date(2024, 1, 1), None)];
        let request = SnapshotRequest { quarter: Quarter::new(2025, 1), pinned_digest: None };
        let ctx = resolve(DatasetId::Gpci, &snaps, date(2025, 3, 31), &request).unwrap();
        assert_eq!(ctx.selection_reason, SelectionReason::Stepback);
        assert_eq!(ctx.chosen_effective_from, date(2024, 1, 1));
        // Prior quarter attempt recorded as a miss before the year hit
        assert_eq!(ctx.stepbacks.len(), 2);
        assert_eq!(ctx.stepbacks[0].found_effective_from, None);
        assert_eq!(ctx.stepbacks[1].granularity, StepbackGranularity::PriorYear);
    }

    #[test]
    fn stepback_bounds_strictly_decrease() {
        let snaps = vec![snap(DatasetId::Gpci, date(2020, 1, 1), None)];
        let request = SnapshotRequest { quarter: Quarter::new(2025, 2), pinned_digest: None };
        let ctx = resolve(DatasetId::Gpci, &snaps, date(2025, 6, 30), &request).unwrap();
        assert_eq!(ctx.selection_reason, SelectionReason::Stepback);
        for pair in ctx.stepbacks.windows(2) {
            assert!(pair[1].attempted_bound <= pair[0].attempted_bound || {
                // the final any-granularity pass re-uses the original bound
                pair[1].granularity == StepbackGranularity::AnyEarlier
            });
        }
        // Never selects a vintage after the requested bound
        assert!(ctx.chosen_effective_from <= date(2025, 6, 30));
    }

    #[test]
    fn exhausted_when_nothing_is_early_enough() {
        let snaps = vec![snap(DatasetId::Gpci, date(2026, 1, 1), None)];
        let request = SnapshotRequest::default();
        let err = resolve(DatasetId::Gpci, &snaps, date(2025, 12, 31), &request).unwrap_err();
        assert!(matches!(err, SnapshotError::Exhausted { attempts: 3, .. }));
    }

    #[test]
    fn provider_specific_prefers_covering_window() {
        let snaps = vec![
            snap(DatasetId::FacilityRates, date(2024, 1, 1), Some(date(2025, 1, 1))),
            snap(DatasetId::FacilityRates, date(2025, 1, 1), Some(date(2026, 1, 1))),
        ];
        let request = SnapshotRequest::default();
        let ctx = resolve(DatasetId::FacilityRates, &snaps, date(2025, 6, 1), &request).unwrap();
        assert_eq!(ctx.chosen_effective_from, date(2025, 1, 1));

        // No covering window: falls back to latest-not-after
        let ctx =
            resolve(DatasetId::FacilityRates, &snaps, date(2026, 6, 1), &request).unwrap();
        assert_eq!(ctx.chosen_effective_from, date(2025, 1, 1));
        assert_eq!(ctx.selection_reason, SelectionReason::Latest);
    }
}
