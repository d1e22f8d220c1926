//! Shared fixtures for engine tests.

use crate::types::{PlanComponent, Setting};
use chrono::NaiveDate;
use geo_resolver::{GeoCandidate, ResolvedGeography};
use reference_data::{
    DatasetId, GeographyRecord, GpciEntry, InMemoryReferenceStore, ResolvedContext, RvuEntry,
    SelectionReason, SnapshotKey,
};
use std::collections::BTreeMap;

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn vintage(dataset_id: DatasetId) -> SnapshotKey {
    SnapshotKey { dataset_id, effective_from: date(2025, 7, 1) }
}

pub(crate) fn resolved(dataset_id: DatasetId) -> ResolvedContext {
    ResolvedContext {
        dataset_id,
        chosen_effective_from: date(2025, 7, 1),
        chosen_effective_to: Some(date(2025, 10, 1)),
        digest: format!("sha256:{dataset_id}:2025q3"),
        selection_reason: SelectionReason::Quarter,
        stepbacks: Vec::new(),
    }
}

pub(crate) fn contexts_for(datasets: &[DatasetId]) -> BTreeMap<DatasetId, ResolvedContext> {
    datasets.iter().map(|d| (*d, resolved(*d))).collect()
}

pub(crate) fn geography() -> ResolvedGeography {
    let record = GeographyRecord {
        zip5: "94110".into(),
        locality_id: "01".into(),
        cbsa: Some("41860".into()),
        share: 1.0,
        effective_from: date(2024, 1, 1),
        effective_to: None,
    };
    ResolvedGeography {
        candidates: vec![GeoCandidate { record: record.clone(), used: true }],
        used: record,
        ambiguous: false,
        notes: Vec::new(),
    }
}

pub(crate) fn professional_component(code: &str) -> PlanComponent {
    PlanComponent {
        code: code.into(),
        setting: Setting::Professional,
        units: 1,
        utilization_weight: 1.0,
        professional_component: true,
        facility_component: false,
        modifiers: Vec::new(),
        pos: None,
        ndc: None,
        wastage_units: None,
    }
}

/// Store + contexts + geography loaded with the Scenario A MPFS fixture:
/// 99213 work=1.0 pe=1.2 mp=0.1, GPCI {1.0, 1.1, 1.0}, CF 33.00.
pub(crate) fn mpfs_fixture(
) -> (InMemoryReferenceStore, BTreeMap<DatasetId, ResolvedContext>, ResolvedGeography) {
    let mut store = InMemoryReferenceStore::new();
    store.load_rvu(
        vintage(DatasetId::MpfsRvu),
        "99213",
        RvuEntry { work: 1.0, pe_facility: 1.2, pe_nonfacility: 1.2, mp: 0.1 },
    );
    store.load_gpci(
        vintage(DatasetId::Gpci),
        "01",
        GpciEntry { work: 1.0, pe: 1.1, mp: 1.0 },
    );
    store.load_conversion_factor(vintage(DatasetId::ConversionFactor), 33.00);

    let contexts = contexts_for(Setting::Professional.required_datasets());
    (store, contexts, geography())
}
