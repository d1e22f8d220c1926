use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use chrono::NaiveDate;
use comparison_engine::{ComparisonEngine, ComparisonRequest, ProviderEntity};
use pricing_engines::{Plan, PlanComponent, Setting};
use reference_data::{
    AddendumBEntry, DatasetId, DatasetSnapshot, GeographyRecord, GpciEntry,
    InMemoryReferenceStore, RvuEntry, SnapshotKey, StatusIndicator,
};
use run_orchestrator::{
    BenefitParams, OrchestratorConfig, OrchestratorError, PinnedSnapshot, PricingRequest,
    RunOrchestrator,
};
use snapshot_resolver::Quarter;

#[tokio::main]
async fn main() -> Result<()> {
    println!("🚀 Starting Pricing Engine Integration Test");

    let store = seed_reference_store();
    let orchestrator = RunOrchestrator::new(OrchestratorConfig::default(), Arc::new(store));

    // Test 1: MPFS office visit end to end
    println!("\n💉 Test 1: MPFS office visit (99213, locality 01)...");
    let run = orchestrator.execute(mpfs_request()).await?;
    ensure!(run.totals.allowed_cents == 7986, "expected 7986, got {}", run.totals.allowed_cents);
    println!("   ✅ Allowed ${:.2}", run.totals.allowed_cents as f64 / 100.0);
    println!("   ✅ {} dataset vintages in trace", run.trace.datasets.len());
    for context in &run.resolved_contexts {
        println!(
            "      {} -> {} ({})",
            context.dataset_id, context.chosen_effective_from, context.digest
        );
    }

    // Test 2: OPPS conditional packaging
    println!("\n🏥 Test 2: OPPS conditional packaging (Q1 next to J1)...");
    let run = orchestrator.execute(opps_request(true)).await?;
    let ancillary = &run.line_items[1];
    ensure!(ancillary.result.packaged, "Q1 line should package under a J1 primary");
    ensure!(ancillary.result.total_cents == 0, "packaged line must carry no beneficiary share");
    println!("   ✅ Q1 line packaged, beneficiary share $0.00");

    let run = orchestrator.execute(opps_request(false)).await?;
    ensure!(!run.line_items[0].result.packaged, "Q1 line without a J1 primary pays separately");
    println!("   ✅ Q1 line paid separately without a J1 primary");

    // Test 3: pinned digest miss fails closed
    println!("\n📌 Test 3: pinned snapshot digest miss...");
    let mut request = mpfs_request();
    request.pinned.push(PinnedSnapshot {
        dataset_id: DatasetId::MpfsRvu,
        digest: "sha256:never-published".into(),
    });
    match orchestrator.execute(request).await {
        Err(OrchestratorError::Snapshot { dataset, source }) => {
            println!("   ✅ Failed closed: {dataset}: {source}");
        }
        Ok(_) => anyhow::bail!("pinned digest miss must never finalize a run"),
        Err(other) => anyhow::bail!("unexpected error: {other}"),
    }

    // Test 4: ambiguous ZIP resolves deterministically
    println!("\n🗺️ Test 4: ambiguous ZIP straddling two localities...");
    let mut request = mpfs_request();
    request.zip5 = "64801".into();
    let run = orchestrator.execute(request).await?;
    ensure!(run.geography.ambiguous, "64801 should be flagged ambiguous");
    ensure!(run.geography.used.locality_id == "03", "highest share wins the tie-break");
    println!(
        "   ✅ Ambiguity flagged, chose locality {} ({} candidates)",
        run.geography.used.locality_id,
        run.geography.candidates.len()
    );

    // Test 5: identical inputs, identical runs
    println!("\n🔁 Test 5: determinism across repeated runs...");
    let first = orchestrator.execute(mpfs_request()).await?;
    let second = orchestrator.execute(mpfs_request()).await?;
    ensure!(first.run_id == second.run_id, "run ids must be input-derived");
    ensure!(first.totals == second.totals, "totals must be bit-identical");
    println!("   ✅ run_id {} stable across executions", first.run_id);

    // Test 6: cross-provider comparison with parity
    println!("\n⚖️ Test 6: two-provider comparison...");
    let store = seed_reference_store();
    let comparison = ComparisonEngine::new(OrchestratorConfig::default(), Arc::new(store));
    let outcome = comparison.execute(comparison_request()).await?;
    ensure!(outcome.result.parity_ok, "parity gate must pass for pinned runs");
    let winner = outcome
        .result
        .winner_flags
        .iter()
        .position(|w| *w)
        .context("a winner is always flagged")?;
    println!("   ✅ Parity ok over {} runs", outcome.result.run_ids.len());
    println!(
        "   ✅ Winner: {} (delta ${:.2})",
        outcome.result.columns[winner],
        outcome.result.deltas[winner].total_delta_cents as f64 / 100.0
    );

    println!("\n🎉 Integration test completed!");
    println!("\n📝 Summary:");
    println!("   - Snapshot, geography, and pricing resolution working end to end");
    println!("   - Packaging and cost share applied in order");
    println!("   - Pinned vintages fail closed");
    println!("   - Runs are deterministic and comparison parity holds");

    Ok(())
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn vintage(dataset_id: DatasetId) -> SnapshotKey {
    SnapshotKey { dataset_id, effective_from: date(2025, 7, 1) }
}

fn seed_reference_store() -> InMemoryReferenceStore {
    let mut store = InMemoryReferenceStore::new();

    for dataset_id in [
        DatasetId::MpfsRvu,
        DatasetId::Gpci,
        DatasetId::ConversionFactor,
        DatasetId::OppsAddendumB,
        DatasetId::WageIndex,
    ] {
        store.publish_snapshot(DatasetSnapshot {
            dataset_id,
            effective_from: date(2025, 7, 1),
            effective_to: Some(date(2025, 10, 1)),
            digest: format!("sha256:{dataset_id}:2025q3"),
            source_url: format!("https://cms.gov/files/{dataset_id}/2025q3"),
        });
    }

    store.add_geography(GeographyRecord {
        zip5: "94110".into(),
        locality_id: "01".into(),
        cbsa: Some("41860".into()),
        share: 1.0,
        effective_from: date(2024, 1, 1),
        effective_to: None,
    });
    // A ZIP straddling two localities, both above the materiality threshold
    store.add_geography(GeographyRecord {
        zip5: "64801".into(),
        locality_id: "03".into(),
        cbsa: Some("27900".into()),
        share: 0.6,
        effective_from: date(2024, 1, 1),
        effective_to: None,
    });
    store.add_geography(GeographyRecord {
        zip5: "64801".into(),
        locality_id: "07".into(),
        cbsa: Some("27900".into()),
        share: 0.4,
        effective_from: date(2024, 1, 1),
        effective_to: None,
    });
    store.add_geography(GeographyRecord {
        zip5: "59901".into(),
        locality_id: "02".into(),
        cbsa: None,
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
    store.load_gpci(vintage(DatasetId::Gpci), "02", GpciEntry { work: 1.0, pe: 0.9, mp: 1.0 });
    store.load_gpci(vintage(DatasetId::Gpci), "03", GpciEntry { work: 1.0, pe: 1.0, mp: 1.0 });
    store.load_gpci(vintage(DatasetId::Gpci), "07", GpciEntry { work: 1.0, pe: 1.0, mp: 1.0 });
    store.load_conversion_factor(vintage(DatasetId::ConversionFactor), 33.00);

    store.load_addendum_b(
        vintage(DatasetId::OppsAddendumB),
        "27447",
        AddendumBEntry {
            apc: "5115".into(),
            status_indicator: StatusIndicator::J1,
            rate_cents: 1_200_000,
        },
    );
    store.load_addendum_b(
        vintage(DatasetId::OppsAddendumB),
        "36000",
        AddendumBEntry {
            apc: "5734".into(),
            status_indicator: StatusIndicator::Q1,
            rate_cents: 15_000,
        },
    );
    store.load_wage_index(vintage(DatasetId::WageIndex), "41860", 1.2);
    store.load_wage_index(vintage(DatasetId::WageIndex), "27900", 0.9);

    store
}

fn component(code: &str, setting: Setting) -> PlanComponent {
    PlanComponent {
        code: code.into(),
        setting,
        units: 1,
        utilization_weight: 1.0,
        professional_component: setting == Setting::Professional,
        facility_component: setting != Setting::Professional,
        modifiers: Vec::new(),
        pos: None,
        ndc: None,
        wastage_units: None,
    }
}

fn mpfs_request() -> PricingRequest {
    PricingRequest {
        plan: Plan {
            plan_id: "office-visit".into(),
            components: vec![component("99213", Setting::Professional)],
        },
        zip5: "94110".into(),
        year: 2025,
        quarter: Quarter::new(2025, 3),
        pinned: Vec::new(),
        ccn: None,
        payer: None,
        benefit_params: BenefitParams { deductible_met_cents: 25_700, ..Default::default() },
    }
}

fn opps_request(with_primary: bool) -> PricingRequest {
    let mut components = Vec::new();
    if with_primary {
        components.push(component("27447", Setting::Outpatient));
    }
    components.push(component("36000", Setting::Outpatient));
    PricingRequest {
        plan: Plan { plan_id: "knee-replacement".into(), components },
        zip5: "94110".into(),
        year: 2025,
        quarter: Quarter::new(2025, 3),
        pinned: Vec::new(),
        ccn: None,
        payer: None,
        benefit_params: BenefitParams { deductible_met_cents: 25_700, ..Default::default() },
    }
}

fn comparison_request() -> ComparisonRequest {
    ComparisonRequest {
        plan: Plan {
            plan_id: "office-visit".into(),
            components: vec![component("99213", Setting::Professional)],
        },
        comparison_zip: "00000".into(),
        year: 2025,
        quarter: Quarter::new(2025, 3),
        benefit_params: BenefitParams { deductible_met_cents: 25_700, ..Default::default() },
        providers: vec![
            ProviderEntity {
                entity_id: "medicare-benchmark".into(),
                name: None,
                service_zip: "94110".into(),
                ccn: None,
                payer: None,
            },
            ProviderEntity {
                entity_id: "flathead-clinic".into(),
                name: Some("Flathead Valley Clinic".into()),
                service_zip: "59901".into(),
                ccn: None,
                payer: None,
            },
        ],
    }
}
