//! Storage collaborator trait and the in-memory implementation used by
//! tests and the integration tool.
//!
//! The ingestion/persistence system that produces versioned datasets lives
//! outside this core; everything it must provide is captured by
//! [`ReferenceStore`]. All typed row lookups are keyed by a [`SnapshotKey`]
//! so an engine can only ever read from the vintage the resolver chose.

use crate::error::Result;
use crate::types::{
    AddendumBEntry, AspPriceEntry, Cents, CrosswalkEntry, DatasetId, DatasetSnapshot,
    DmeposFeeEntry, GeographyRecord, GpciEntry, IppsRates, NadacPriceEntry, RvuEntry, SnapshotKey,
    ZipDistance,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Read-only boundary to the reference-data collaborator.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// All published snapshots for a dataset, in no guaranteed order.
    async fn get_dataset_snapshots(&self, dataset_id: DatasetId) -> Result<Vec<DatasetSnapshot>>;

    /// All locality candidates for a ZIP, including historical windows.
    async fn get_geography_candidates(&self, zip5: &str) -> Result<Vec<GeographyRecord>>;

    /// Official rural-ZIP table lookup; `None` means the table has no row.
    async fn get_rural_flag(&self, zip5: &str) -> Result<Option<bool>>;

    /// ZIPs within `radius_miles` of the origin, used for comparison
    /// geography expansion. Implementations may return them unsorted.
    async fn get_zips_within(&self, zip5: &str, radius_miles: u32) -> Result<Vec<ZipDistance>>;

    /// CCN to CBSA join used by wage-index lookups.
    async fn get_cbsa_for_ccn(&self, ccn: &str) -> Result<Option<String>>;

    async fn get_rvu(&self, key: &SnapshotKey, code: &str) -> Result<Option<RvuEntry>>;
    async fn get_gpci(&self, key: &SnapshotKey, locality_id: &str) -> Result<Option<GpciEntry>>;
    async fn get_conversion_factor(&self, key: &SnapshotKey) -> Result<Option<f64>>;
    async fn get_addendum_b(&self, key: &SnapshotKey, code: &str) -> Result<Option<AddendumBEntry>>;
    async fn get_wage_index(&self, key: &SnapshotKey, cbsa: &str) -> Result<Option<f64>>;
    async fn get_asc_fee(&self, key: &SnapshotKey, code: &str) -> Result<Option<Cents>>;
    async fn get_ipps_rates(&self, key: &SnapshotKey) -> Result<Option<IppsRates>>;
    async fn get_drg_weight(&self, key: &SnapshotKey, drg: &str) -> Result<Option<f64>>;
    async fn get_clfs_fee(&self, key: &SnapshotKey, code: &str) -> Result<Option<Cents>>;
    async fn get_dmepos_fee(&self, key: &SnapshotKey, code: &str)
        -> Result<Option<DmeposFeeEntry>>;
    async fn get_asp_price(&self, key: &SnapshotKey, code: &str) -> Result<Option<AspPriceEntry>>;
    async fn get_nadac_price(&self, key: &SnapshotKey, ndc: &str)
        -> Result<Option<NadacPriceEntry>>;
    async fn get_crosswalk(&self, key: &SnapshotKey, ndc: &str) -> Result<Option<CrosswalkEntry>>;
}

type Keyed<T> = HashMap<(SnapshotKey, String), T>;

/// In-memory [`ReferenceStore`] backed by hash maps. Fixture data is loaded
/// through the `&mut self` loaders before the store is shared; reads are
/// lock-free and never fail.
#[derive(Default)]
pub struct InMemoryReferenceStore {
    snapshots: HashMap<DatasetId, Vec<DatasetSnapshot>>,
    geography: HashMap<String, Vec<GeographyRecord>>,
    rural_flags: HashMap<String, bool>,
    zip_distances: HashMap<String, Vec<ZipDistance>>,
    ccn_cbsa: HashMap<String, String>,
    rvus: Keyed<RvuEntry>,
    gpcis: Keyed<GpciEntry>,
    conversion_factors: HashMap<SnapshotKey, f64>,
    addendum_b: Keyed<AddendumBEntry>,
    wage_indices: Keyed<f64>,
    asc_fees: Keyed<Cents>,
    ipps_rates: HashMap<SnapshotKey, IppsRates>,
    drg_weights: Keyed<f64>,
    clfs_fees: Keyed<Cents>,
    dmepos_fees: Keyed<DmeposFeeEntry>,
    asp_prices: Keyed<AspPriceEntry>,
    nadac_prices: Keyed<NadacPriceEntry>,
    crosswalk: Keyed<CrosswalkEntry>,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_snapshot(&mut self, snapshot: DatasetSnapshot) {
        self.snapshots.entry(snapshot.dataset_id).or_default().push(snapshot);
    }

    pub fn add_geography(&mut self, record: GeographyRecord) {
        self.geography.entry(record.zip5.clone()).or_default().push(record);
    }

    pub fn set_rural_flag(&mut self, zip5: &str, rural: bool) {
        self.rural_flags.insert(zip5.to_string(), rural);
    }

    pub fn add_zip_distance(&mut self, origin: &str, neighbor: ZipDistance) {
        self.zip_distances.entry(origin.to_string()).or_default().push(neighbor);
    }

    pub fn set_ccn_cbsa(&mut self, ccn: &str, cbsa: &str) {
        self.ccn_cbsa.insert(ccn.to_string(), cbsa.to_string());
    }

    pub fn load_rvu(&mut self, key: SnapshotKey, code: &str, entry: RvuEntry) {
        self.rvus.insert((key, code.to_string()), entry);
    }

    pub fn load_gpci(&mut self, key: SnapshotKey, locality_id: &str, entry: GpciEntry) {
        self.gpcis.insert((key, locality_id.to_string()), entry);
    }

    pub fn load_conversion_factor(&mut self, key: SnapshotKey, cf: f64) {
        self.conversion_factors.insert(key, cf);
    }

    pub fn load_addendum_b(&mut self, key: SnapshotKey, code: &str, entry: AddendumBEntry) {
        self.addendum_b.insert((key, code.to_string()), entry);
    }

    pub fn load_wage_index(&mut self, key: SnapshotKey, cbsa: &str, index: f64) {
        self.wage_indices.insert((key, cbsa.to_string()), index);
    }

    pub fn load_asc_fee(&mut self, key: SnapshotKey, code: &str, fee_cents: Cents) {
        self.asc_fees.insert((key, code.to_string()), fee_cents);
    }

    pub fn load_ipps_rates(&mut self, key: SnapshotKey, rates: IppsRates) {
        self.ipps_rates.insert(key, rates);
    }

    pub fn load_drg_weight(&mut self, key: SnapshotKey, drg: &str, weight: f64) {
        self.drg_weights.insert((key, drg.to_string()), weight);
    }

    pub fn load_clfs_fee(&mut self, key: SnapshotKey, code: &str, fee_cents: Cents) {
        self.clfs_fees.insert((key, code.to_string()), fee_cents);
    }

    pub fn load_dmepos_fee(&mut self, key: SnapshotKey, code: &str, entry: DmeposFeeEntry) {
        self.dmepos_fees.insert((key, code.to_string()), entry);
    }

    pub fn load_asp_price(&mut self, key: SnapshotKey, code: &str, entry: AspPriceEntry) {
        self.asp_prices.insert((key, code.to_string()), entry);
    }

    pub fn load_nadac_price(&mut self, key: SnapshotKey, ndc: &str, entry: NadacPriceEntry) {
        self.nadac_prices.insert((key, ndc.to_string()), entry);
    }

    pub fn load_crosswalk(&mut self, key: SnapshotKey, entry: CrosswalkEntry) {
        self.crosswalk.insert((key, entry.ndc.clone()), entry);
    }
}

#[async_trait]
impl ReferenceStore for InMemoryReferenceStore {
    async fn get_dataset_snapshots(&self, dataset_id: DatasetId) -> Result<Vec<DatasetSnapshot>> {
        Ok(self.snapshots.get(&dataset_id).cloned().unwrap_or_default())
    }

    async fn get_geography_candidates(&self, zip5: &str) -> Result<Vec<GeographyRecord>> {
        Ok(self.geography.get(zip5).cloned().unwrap_or_default())
    }

    async fn get_rural_flag(&self, zip5: &str) -> Result<Option<bool>> {
        Ok(self.rural_flags.get(zip5).copied())
    }

    async fn get_zips_within(&self, zip5: &str, radius_miles: u32) -> Result<Vec<ZipDistance>> {
        Ok(self
            .zip_distances
            .get(zip5)
            .map(|neighbors| {
                neighbors
                    .iter()
                    .filter(|z| z.distance_miles <= radius_miles as f64)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_cbsa_for_ccn(&self, ccn: &str) -> Result<Option<String>> {
        Ok(self.ccn_cbsa.get(ccn).cloned())
    }

    async fn get_rvu(&self, key: &SnapshotKey, code: &str) -> Result<Option<RvuEntry>> {
        Ok(self.rvus.get(&(*key, code.to_string())).copied())
    }

    async fn get_gpci(&self, key: &SnapshotKey, locality_id: &str) -> Result<Option<GpciEntry>> {
        Ok(self.gpcis.get(&(*key, locality_id.to_string())).copied())
    }

    async fn get_conversion_factor(&self, key: &SnapshotKey) -> Result<Option<f64>> {
        Ok(self.conversion_factors.get(key).copied())
    }

    async fn get_addendum_b(
        &self,
        key: &SnapshotKey,
        code: &str,
    ) -> Result<Option<AddendumBEntry>> {
        Ok(self.addendum_b.get(&(*key, code.to_string())).cloned())
    }

    async fn get_wage_index(&self, key: &SnapshotKey, cbsa: &str) -> Result<Option<f64>> {
        Ok(self.wage_indices.get(&(*key, cbsa.to_string())).copied())
    }

    async fn get_asc_fee(&self, key: &SnapshotKey, code: &str) -> Result<Option<Cents>> {
        Ok(self.asc_fees.get(&(*key, code.to_string())).copied())
    }

    async fn get_ipps_rates(&self, key: &SnapshotKey) -> Result<Option<IppsRates>> {
        Ok(self.ipps_rates.get(key).copied())
    }

    async fn get_drg_weight(&self, key: &SnapshotKey, drg: &str) -> Result<Option<f64>> {
        Ok(self.drg_weights.get(&(*key, drg.to_string())).copied())
    }

    async fn get_clfs_fee(&self, key: &SnapshotKey, code: &str) -> Result<Option<Cents>> {
        Ok(self.clfs_fees.get(&(*key, code.to_string())).copied())
    }

    async fn get_dmepos_fee(
        &self,
        key: &SnapshotKey,
        code: &str,
    ) -> Result<Option<DmeposFeeEntry>> {
        Ok(self.dmepos_fees.get(&(*key, code.to_string())).copied())
    }

    async fn get_asp_price(&self, key: &SnapshotKey, code: &str) -> Result<Option<AspPriceEntry>> {
        Ok(self.asp_prices.get(&(*key, code.to_string())).copied())
    }

    async fn get_nadac_price(
        &self,
        key: &SnapshotKey,
        ndc: &str,
    ) -> Result<Option<NadacPriceEntry>> {
        Ok(self.nadac_prices.get(&(*key, ndc.to_string())).copied())
    }

    async fn get_crosswalk(&self, key: &SnapshotKey, ndc: &str) -> Result<Option<CrosswalkEntry>> {
        Ok(self.crosswalk.get(&(*key, ndc.to_string())).cloned())
    }
}
