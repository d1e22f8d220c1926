//! The run orchestrator: resolves geography once, resolves every needed
//! dataset vintage once, fans pricing out per line, applies cross-line
//! adjustments and cost share, aggregates with exact integer totals, and
//! assembles the immutable trace.
//!
//! Cancellation is dropping the `execute` future: the `Run` value only
//! exists at finalization, so a cancelled or failed run can never leak
//! partial state to comparisons or trace queries.

use crate::config::OrchestratorConfig;
use crate::cost_share::apply_cost_share;
use crate::error::{LineFailure, OrchestratorError, Result};
use crate::state::RunState;
use crate::trace::TraceRecorder;
use crate::types::{MoneyDescriptor, PricingRequest, Run, RunTotals};
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use geo_resolver::{rural_status, GeoResolver, ResolvedGeography, RuralStatus};
use modifier_processor::ModifierProcessor;
use pricing_engines::{EngineSet, PricedLine, PricingContext, Setting};
use reference_data::{
    DatasetId, ReferenceStore, ResolvedContext, RetryingStore, SnapshotCache, TraceStage,
};
use snapshot_resolver::SnapshotRequest;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct RunOrchestrator {
    engines: EngineSet,
    geo: GeoResolver,
    modifiers: ModifierProcessor,
    cache: SnapshotCache,
    store: Arc<dyn ReferenceStore>,
}

impl RunOrchestrator {
    pub fn new(config: OrchestratorConfig, store: Arc<dyn ReferenceStore>) -> Self {
        // Every collaborator fetch, typed row lookups included, goes
        // through the timeout/retry adapter.
        let store: Arc<dyn ReferenceStore> =
            Arc::new(RetryingStore::new(store, config.retry.clone()));
        Self {
            engines: EngineSet::new(config.engines.clone()),
            geo: GeoResolver::new(config.geo.clone()),
            modifiers: ModifierProcessor::new(),
            cache: SnapshotCache::new(config.cache.clone()),
            store,
        }
    }

    /// Publication event from the ingestion collaborator; drops any cache
    /// entry the new snapshot supersedes.
    pub fn on_snapshot_published(&self, dataset_id: DatasetId, effective_from: NaiveDate) {
        self.cache.invalidate_on_publish(dataset_id, effective_from);
    }

    /// Execute one pricing request end to end. Any failure moves the run
    /// to the terminal `Failed` state; nothing partial is ever finalized.
    pub async fn execute(&self, request: PricingRequest) -> Result<Run> {
        let mut state = RunState::Pending;
        match self.run_pipeline(request, &mut state).await {
            Ok(run) => Ok(run),
            Err(error) => {
                if let Ok(failed) = state.advance(RunState::Failed) {
                    state = failed;
                }
                warn!(%error, state = ?state, "run failed, partial state discarded");
                Err(error)
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: PricingRequest,
        state: &mut RunState,
    ) -> Result<Run> {
        validate(&request)?;
        let valuation_date = request.valuation_date();
        let mut trace = TraceRecorder::new();

        // Geography resolves once per run, before any engine.
        let geography = self
            .geo
            .resolve(self.store.as_ref(), &request.zip5, valuation_date)
            .await?;
        trace.notes(geography.notes.clone());
        *state = state.advance(RunState::GeographyResolved)?;

        let rural = self.rural_if_needed(&request, &geography).await?;
        if let Some(status) = &rural {
            trace.notes(status.warnings.clone());
        }

        // Snapshot resolution, once per dataset the plan touches.
        let contexts = self.resolve_snapshots(&request, valuation_date, &mut trace).await?;
        *state = state.advance(RunState::SnapshotsResolved)?;

        // Per-line fan-out; lines have no data dependency on each other.
        let ctx = PricingContext {
            contexts: &contexts,
            geography: &geography,
            rural: rural.as_ref(),
            ccn: request.ccn.as_deref(),
        };
        let mut lines = self.price_lines(&request, &ctx).await?;
        *state = state.advance(RunState::Priced)?;

        // Cross-line adjustments and cost share, with every line visible.
        trace.notes(self.modifiers.apply(&request.plan, &mut lines));
        trace.notes(apply_cost_share(&request.benefit_params, &mut lines));
        trace.record_lines(&lines);

        // Exact integer aggregation; the join point for the fan-out.
        let totals = aggregate(&lines)?;
        trace.note(reference_data::TraceNote::new(
            TraceStage::Aggregation,
            format!("{} lines, allowed total {}", lines.len(), totals.allowed_cents),
        ));
        *state = state.advance(RunState::Aggregated)?;
        *state = state.advance(RunState::Finalized)?;

        let run = Run {
            run_id: deterministic_run_id(&request)?,
            created_at: Utc::now(),
            money: MoneyDescriptor::default(),
            geography,
            resolved_contexts: contexts.into_values().collect(),
            line_items: lines,
            totals,
            trace: trace.finalize(request.benefit_params.toggles.clone()),
            inputs: request,
        };
        info!(run_id = %run.run_id, allowed = run.totals.allowed_cents, "run finalized");
        Ok(run)
    }

    async fn rural_if_needed(
        &self,
        request: &PricingRequest,
        geography: &ResolvedGeography,
    ) -> Result<Option<RuralStatus>> {
        let needs_rural = request
            .plan
            .components
            .iter()
            .any(|c| c.setting == Setting::DurableEquipment);
        if !needs_rural {
            return Ok(None);
        }
        Ok(Some(rural_status(self.store.as_ref(), &request.zip5, geography).await?))
    }

    async fn resolve_snapshots(
        &self,
        request: &PricingRequest,
        valuation_date: NaiveDate,
        trace: &mut TraceRecorder,
    ) -> Result<BTreeMap<DatasetId, ResolvedContext>> {
        let datasets: BTreeSet<DatasetId> = request
            .plan
            .components
            .iter()
            .flat_map(|c| c.setting.required_datasets().iter().copied())
            .collect();

        let mut contexts = BTreeMap::new();
        for dataset_id in datasets {
            let snapshots = match self.cache.get(dataset_id, valuation_date) {
                Some(cached) => cached,
                None => {
                    let fetched = self.store.get_dataset_snapshots(dataset_id).await?;
                    self.cache.put(dataset_id, valuation_date, fetched.clone());
                    fetched
                }
            };

            let snapshot_request = SnapshotRequest {
                quarter: request.quarter,
                pinned_digest: request.pinned_digest_for(dataset_id).map(String::from),
            };
            let context =
                snapshot_resolver::resolve(dataset_id, &snapshots, valuation_date, &snapshot_request)
                    .map_err(|source| OrchestratorError::Snapshot { dataset: dataset_id, source })?;
            trace.record_dataset(&context);
            contexts.insert(dataset_id, context);
        }
        Ok(contexts)
    }

    async fn price_lines(
        &self,
        request: &PricingRequest,
        ctx: &PricingContext<'_>,
    ) -> Result<Vec<PricedLine>> {
        let futures = request.plan.components.iter().enumerate().map(|(index, component)| {
            let engine = self.engines.engine_for(component.setting);
            async move { (index, engine.price(index, component, ctx, self.store.as_ref()).await) }
        });

        let mut lines = Vec::with_capacity(request.plan.components.len());
        let mut failures = Vec::new();
        for (index, outcome) in join_all(futures).await {
            match outcome {
                Ok(line) => lines.push(line),
                Err(error) => {
                    warn!(index, %error, "line pricing failed");
                    failures.push(LineFailure {
                        component_index: index,
                        code: request.plan.components[index].code.clone(),
                        error,
                    });
                }
            }
        }
        if !failures.is_empty() {
            return Err(OrchestratorError::LinePricing { failures });
        }
        lines.sort_by_key(|l| l.component_index);
        Ok(lines)
    }
}

fn validate(request: &PricingRequest) -> Result<()> {
    if request.plan.components.is_empty() {
        return Err(OrchestratorError::Validation("plan has no components".into()));
    }
    for (index, component) in request.plan.components.iter().enumerate() {
        if component.code.trim().is_empty() {
            return Err(OrchestratorError::Validation(format!(
                "component {index} has an empty code"
            )));
        }
        if component.units == 0 {
            return Err(OrchestratorError::Validation(format!(
                "component {index} ({}) has zero units",
                component.code
            )));
        }
        if component.utilization_weight < 0.0 {
            return Err(OrchestratorError::Validation(format!(
                "component {index} ({}) has negative utilization weight",
                component.code
            )));
        }
    }
    Ok(())
}

/// Totals are the exact integer sum of the line results; no tolerance.
fn aggregate(lines: &[PricedLine]) -> Result<RunTotals> {
    let mut totals = RunTotals::default();
    for line in lines {
        totals.allowed_cents = totals
            .allowed_cents
            .checked_add(line.result.allowed_cents)
            .ok_or_else(|| OrchestratorError::Internal("allowed total overflow".into()))?;
        totals.deductible_cents += line.result.deductible_cents;
        totals.coinsurance_cents += line.result.coinsurance_cents;
        totals.total_cents += line.result.total_cents;
    }
    Ok(totals)
}

/// Runs with identical inputs get identical ids: UUIDv5 over the
/// canonical JSON encoding of the request.
fn deterministic_run_id(request: &PricingRequest) -> Result<Uuid> {
    let canonical = serde_json::to_vec(request)
        .map_err(|e| OrchestratorError::Internal(format!("canonical encoding: {e}")))?;
    Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, &canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BenefitParams, PinnedSnapshot};
    use async_trait::async_trait;
    use pricing_engines::{Plan, PlanComponent, PricingError};
    use reference_data::{
        AddendumBEntry, AspPriceEntry, Cents, CrosswalkEntry, DatasetSnapshot, DmeposFeeEntry,
        GeographyRecord, GpciEntry, InMemoryReferenceStore, IppsRates, NadacPriceEntry,
        Result as StoreResult, RetryConfig, RvuEntry, SnapshotKey, StoreError, ZipDistance,
    };
    use snapshot_resolver::Quarter;
    use std::time::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn vintage(dataset_id: DatasetId) -> SnapshotKey {
        SnapshotKey { dataset_id, effective_from: date(2025, 7, 1) }
    }

    fn publish(store: &mut InMemoryReferenceStore, dataset_id: DatasetId) {
        store.publish_snapshot(DatasetSnapshot {
            dataset_id,
            effective_from: date(2025, 7, 1),
            effective_to: Some(date(2025, 10, 1)),
            digest: format!("sha256:{dataset_id}:2025q3"),
            source_url: format!("https://cms.gov/{dataset_id}/2025q3"),
        });
    }

    fn scenario_a_store() -> InMemoryReferenceStore {
        let mut store = InMemoryReferenceStore::new();
        for dataset in Setting::Professional.required_datasets() {
            publish(&mut store, *dataset);
        }
        store.add_geography(GeographyRecord {
            zip5: "94110".into(),
            locality_id: "01".into(),
            cbsa: Some("41860".into()),
            share: 1.0,
            effective_from: date(2024, 1, 1),
            effective_to: None,
        });
        store.load_rvu(
            vintage(DatasetId::MpfsRvu),
            "99213",
            RvuEntry { work: 1.0, pe_facility: 1.2, pe_nonfacility: 1.2, mp: 0.1 },
        );
        store.load_gpci(vintage(DatasetId::Gpci), "01", GpciEntry { work: 1.0, pe: 1.1, mp: 1.0 });
        store.load_conversion_factor(vintage(DatasetId::ConversionFactor), 33.00);
        store
    }

    fn scenario_a_request() -> PricingRequest {
        PricingRequest {
            plan: Plan {
                plan_id: "plan-a".into(),
                components: vec![PlanComponent {
                    code: "99213".into(),
                    setting: Setting::Professional,
                    units: 1,
                    utilization_weight: 1.0,
                    professional_component: true,
                    facility_component: false,
                    modifiers: Vec::new(),
                    pos: None,
                    ndc: None,
                    wastage_units: None,
                }],
            },
            zip5: "94110".into(),
            year: 2025,
            quarter: Quarter::new(2025, 3),
            pinned: Vec::new(),
            ccn: None,
            payer: None,
            benefit_params: BenefitParams {
                deductible_met_cents: 25_700,
                ..Default::default()
            },
        }
    }

    fn orchestrator(store: InMemoryReferenceStore) -> RunOrchestrator {
        RunOrchestrator::new(OrchestratorConfig::default(), Arc::new(store))
    }

    /// Healthy store except RVU lookups, which never complete.
    struct StalledRvuStore {
        inner: InMemoryReferenceStore,
    }

    #[async_trait]
    impl ReferenceStore for StalledRvuStore {
        async fn get_dataset_snapshots(
            &self,
            dataset_id: DatasetId,
        ) -> StoreResult<Vec<DatasetSnapshot>> {
            self.inner.get_dataset_snapshots(dataset_id).await
        }
        async fn get_geography_candidates(
            &self,
            zip5: &str,
        ) -> StoreResult<Vec<GeographyRecord>> {
            self.inner.get_geography_candidates(zip5).await
        }
        async fn get_rural_flag(&self, zip5: &str) -> StoreResult<Option<bool>> {
            self.inner.get_rural_flag(zip5).await
        }
        async fn get_zips_within(
            &self,
            zip5: &str,
            radius_miles: u32,
        ) -> StoreResult<Vec<ZipDistance>> {
            self.inner.get_zips_within(zip5, radius_miles).await
        }
        async fn get_cbsa_for_ccn(&self, ccn: &str) -> StoreResult<Option<String>> {
            self.inner.get_cbsa_for_ccn(ccn).await
        }
        async fn get_rvu(&self, _key: &SnapshotKey, _code: &str) -> StoreResult<Option<RvuEntry>> {
            std::future::pending().await
        }
        async fn get_gpci(
            &self,
            key: &SnapshotKey,
            locality_id: &str,
        ) -> StoreResult<Option<GpciEntry>> {
            self.inner.get_gpci(key, locality_id).await
        }
        async fn get_conversion_factor(&self, key: &SnapshotKey) -> StoreResult<Option<f64>> {
            self.inner.get_conversion_factor(key).await
        }
        async fn get_addendum_b(
            &self,
            key: &SnapshotKey,
            code: &str,
        ) -> StoreResult<Option<AddendumBEntry>> {
            self.inner.get_addendum_b(key, code).await
        }
        async fn get_wage_index(&self, key: &SnapshotKey, cbsa: &str) -> StoreResult<Option<f64>> {
            self.inner.get_wage_index(key, cbsa).await
        }
        async fn get_asc_fee(&self, key: &SnapshotKey, code: &str) -> StoreResult<Option<Cents>> {
            self.inner.get_asc_fee(key, code).await
        }
        async fn get_ipps_rates(&self, key: &SnapshotKey) -> StoreResult<Option<IppsRates>> {
            self.inner.get_ipps_rates(key).await
        }
        async fn get_drg_weight(&self, key: &SnapshotKey, drg: &str) -> StoreResult<Option<f64>> {
            self.inner.get_drg_weight(key, drg).await
        }
        async fn get_clfs_fee(&self, key: &SnapshotKey, code: &str) -> StoreResult<Option<Cents>> {
            self.inner.get_clfs_fee(key, code).await
        }
        async fn get_dmepos_fee(
            &self,
            key: &SnapshotKey,
            code: &str,
        ) -> StoreResult<Option<DmeposFeeEntry>> {
            self.inner.get_dmepos_fee(key, code).await
        }
        async fn get_asp_price(
            &self,
            key: &SnapshotKey,
            code: &str,
        ) -> StoreResult<Option<AspPriceEntry>> {
            self.inner.get_asp_price(key, code).await
        }
        async fn get_nadac_price(
            &self,
            key: &SnapshotKey,
            ndc: &str,
        ) -> StoreResult<Option<NadacPriceEntry>> {
            self.inner.get_nadac_price(key, ndc).await
        }
        async fn get_crosswalk(
            &self,
            key: &SnapshotKey,
            ndc: &str,
        ) -> StoreResult<Option<CrosswalkEntry>> {
            self.inner.get_crosswalk(key, ndc).await
        }
    }

    #[tokio::test]
    async fn scenario_a_end_to_end() {
        let orch = orchestrator(scenario_a_store());
        let run = orch.execute(scenario_a_request()).await.unwrap();

        assert_eq!(run.totals.allowed_cents, 7986);
        assert_eq!(run.line_items[0].result.coinsurance_cents, 1597);
        assert_eq!(run.resolved_contexts.len(), 3);
        assert!(run.trace.formulas[0].contains("MPFS"));
    }

    #[tokio::test]
    async fn exact_money_invariant() {
        let orch = orchestrator(scenario_a_store());
        let run = orch.execute(scenario_a_request()).await.unwrap();
        let sum: i64 = run.line_items.iter().map(|l| l.result.allowed_cents).sum();
        assert_eq!(run.totals.allowed_cents, sum);
    }

    #[tokio::test]
    async fn determinism_identical_requests_identical_runs() {
        let orch = orchestrator(scenario_a_store());
        let a = orch.execute(scenario_a_request()).await.unwrap();
        let b = orch.execute(scenario_a_request()).await.unwrap();

        assert_eq!(a.run_id, b.run_id);
        // created_at is wall clock; everything else must match bytewise
        let mut b_normalized = b.clone();
        b_normalized.created_at = a.created_at;
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b_normalized).unwrap()
        );
    }

    #[tokio::test]
    async fn scenario_c_pinned_digest_miss_aborts() {
        let orch = orchestrator(scenario_a_store());
        let mut request = scenario_a_request();
        request.pinned.push(PinnedSnapshot {
            dataset_id: DatasetId::MpfsRvu,
            digest: "sha256:not-published".into(),
        });
        let err = orch.execute(request).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Snapshot {
                dataset: DatasetId::MpfsRvu,
                source: snapshot_resolver::SnapshotError::NotFound { .. }
            }
        ));
    }

    #[tokio::test]
    async fn missing_reference_row_reports_the_offending_line() {
        let orch = orchestrator(scenario_a_store());
        let mut request = scenario_a_request();
        request.plan.components.push(PlanComponent {
            code: "99999".into(),
            ..request.plan.components[0].clone()
        });
        let err = orch.execute(request).await.unwrap_err();
        match err {
            OrchestratorError::LinePricing { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].code, "99999");
                assert_eq!(failures[0].component_index, 1);
            }
            other => panic!("expected LinePricing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_plan_rejected_before_resolution() {
        let orch = orchestrator(InMemoryReferenceStore::new());
        let mut request = scenario_a_request();
        request.plan.components.clear();
        assert!(matches!(
            orch.execute(request).await.unwrap_err(),
            OrchestratorError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn publish_event_invalidates_cache() {
        let mut store = scenario_a_store();
        // A second, later vintage for the same quarter
        store.publish_snapshot(DatasetSnapshot {
            dataset_id: DatasetId::ConversionFactor,
            effective_from: date(2025, 8, 1),
            effective_to: Some(date(2025, 10, 1)),
            digest: "sha256:conversion_factor:correction".into(),
            source_url: "https://cms.gov/cf/2025q3r2".into(),
        });
        store.load_conversion_factor(
            SnapshotKey {
                dataset_id: DatasetId::ConversionFactor,
                effective_from: date(2025, 8, 1),
            },
            34.00,
        );

        let orch = orchestrator(store);
        let first = orch.execute(scenario_a_request()).await.unwrap();
        orch.on_snapshot_published(DatasetId::ConversionFactor, date(2025, 8, 1));
        let second = orch.execute(scenario_a_request()).await.unwrap();

        // Both runs see the corrected vintage (latest in quarter); the
        // publish hook just drops the cache so it cannot be served stale.
        assert_eq!(first.totals.allowed_cents, second.totals.allowed_cents);
    }

    #[tokio::test]
    async fn hung_row_lookup_aborts_within_retry_budget() {
        let store = StalledRvuStore { inner: scenario_a_store() };
        let config = OrchestratorConfig {
            retry: RetryConfig { max_attempts: 2, fetch_timeout_ms: 50, initial_backoff_ms: 1 },
            ..Default::default()
        };
        let orch = RunOrchestrator::new(config, Arc::new(store));
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            orch.execute(scenario_a_request()),
        )
        .await
        .expect("run must abort within the retry budget, not hang");
        match result.unwrap_err() {
            OrchestratorError::LinePricing { failures } => {
                assert_eq!(failures[0].code, "99213");
                assert!(matches!(
                    failures[0].error,
                    PricingError::Store(StoreError::UpstreamUnavailable { attempts: 2, .. })
                ));
            }
            other => panic!("expected LinePricing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_pipeline_state_is_live_and_can_terminate() {
        let orch = orchestrator(scenario_a_store());
        let mut request = scenario_a_request();
        request.pinned.push(PinnedSnapshot {
            dataset_id: DatasetId::MpfsRvu,
            digest: "sha256:never-published".into(),
        });
        let mut state = RunState::Pending;
        let err = orch.run_pipeline(request, &mut state).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Snapshot { .. }));
        // Geography resolved before the pinned digest mismatch aborted the
        // run; `execute` moves exactly this state to Failed.
        assert_eq!(state, RunState::GeographyResolved);
        assert_eq!(state.advance(RunState::Failed).unwrap(), RunState::Failed);
    }
}
