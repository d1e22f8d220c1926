//! Comparison driver: one orchestrated run per compared entity, under
//! the cross-provider geography fallback policy and enforced snapshot
//! parity.
//!
//! The baseline entity (first in insertion order) runs first; its
//! resolved snapshot digests are pinned into every subsequent entity's
//! request, so a vintage drift between runs surfaces as a hard
//! `SnapshotNotFound` instead of a silent mismatch.

use crate::error::{ComparisonError, Result};
use crate::evaluator::{compare, ComparedRun};
use crate::types::{ComparisonRequest, ComparisonResult, ProviderTrace};
use geo_resolver::GeoResolver;
use reference_data::{ReferenceStore, RetryingStore};
use run_orchestrator::{
    OrchestratorConfig, PinnedSnapshot, PricingRequest, Run, RunOrchestrator,
};
use std::sync::Arc;
use tracing::info;

/// A completed comparison: the evaluator result plus the finalized runs
/// and per-entity geography traces.
#[derive(Debug)]
pub struct ComparisonOutcome {
    pub result: ComparisonResult,
    pub runs: Vec<Run>,
    pub provider_traces: Vec<ProviderTrace>,
}

pub struct ComparisonEngine {
    orchestrator: RunOrchestrator,
    geo: GeoResolver,
    store: Arc<dyn ReferenceStore>,
}

impl ComparisonEngine {
    pub fn new(config: OrchestratorConfig, store: Arc<dyn ReferenceStore>) -> Self {
        // The orchestrator wraps its own store copy; the driver's geography
        // lookups get the same timeout/retry treatment here.
        let retrying: Arc<dyn ReferenceStore> =
            Arc::new(RetryingStore::new(Arc::clone(&store), config.retry.clone()));
        Self {
            geo: GeoResolver::new(config.geo.clone()),
            orchestrator: RunOrchestrator::new(config, store),
            store: retrying,
        }
    }

    pub async fn execute(&self, request: ComparisonRequest) -> Result<ComparisonOutcome> {
        if request.providers.len() < 2 {
            return Err(ComparisonError::Validation(format!(
                "comparison needs at least 2 providers, got {}",
                request.providers.len()
            )));
        }

        let valuation_date = match request.quarter {
            Some(quarter) => quarter.end(),
            None => chrono::NaiveDate::from_ymd_opt(request.year, 12, 31).unwrap_or_default(),
        };

        let mut compared = Vec::with_capacity(request.providers.len());
        let mut runs = Vec::with_capacity(request.providers.len());
        let mut provider_traces = Vec::with_capacity(request.providers.len());
        let mut pins: Vec<PinnedSnapshot> = Vec::new();

        for provider in &request.providers {
            let geography = self
                .geo
                .resolve_for_provider(
                    self.store.as_ref(),
                    &request.comparison_zip,
                    &provider.service_zip,
                    valuation_date,
                )
                .await
                .map_err(|source| ComparisonError::Geography {
                    entity_id: provider.entity_id.clone(),
                    source,
                })?;
            let chosen_zip = geography.used.zip5.clone();

            let run = self
                .orchestrator
                .execute(pricing_request(&request, provider, chosen_zip.clone(), pins.clone()))
                .await
                .map_err(|source| ComparisonError::RunFailed {
                    entity_id: provider.entity_id.clone(),
                    source,
                })?;

            // Pin the baseline's vintages so every later run either
            // matches them exactly or fails closed.
            if pins.is_empty() {
                pins = run
                    .resolved_contexts
                    .iter()
                    .map(|c| PinnedSnapshot { dataset_id: c.dataset_id, digest: c.digest.clone() })
                    .collect();
            }

            provider_traces.push(ProviderTrace {
                entity_id: provider.entity_id.clone(),
                chosen_zip,
                notes: geography.notes,
            });
            compared.push(ComparedRun { entity_id: provider.entity_id.clone(), run: run.clone() });
            runs.push(run);
        }

        let result = compare(&compared)?;
        info!(
            entities = result.columns.len(),
            winner = %result.columns[result.winner_flags.iter().position(|w| *w).unwrap_or(0)],
            "comparison finalized"
        );
        Ok(ComparisonOutcome { result, runs, provider_traces })
    }
}

fn pricing_request(
    request: &ComparisonRequest,
    provider: &crate::types::ProviderEntity,
    zip5: String,
    pinned: Vec<PinnedSnapshot>,
) -> PricingRequest {
    PricingRequest {
        plan: request.plan.clone(),
        zip5,
        year: request.year,
        quarter: request.quarter,
        pinned,
        ccn: provider.ccn.clone(),
        payer: provider.payer.clone(),
        benefit_params: request.benefit_params.clone(),
    }
}
