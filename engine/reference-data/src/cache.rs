//! Injected snapshot cache keyed by `(dataset_id, as_of)`.
//!
//! Safe to share across concurrent runs because published snapshots are
//! immutable. Entries honor a TTL and are explicitly invalidated when the
//! ingestion collaborator publishes a new snapshot: a cached list is never
//! served at or past a newer snapshot's `effective_from` for the same
//! dataset.

use crate::config::CacheConfig;
use crate::types::{DatasetId, DatasetSnapshot};
use chrono::NaiveDate;
use dashmap::DashMap;
use std::time::Instant;
use tracing::debug;

#[derive(Clone)]
struct CachedSnapshots {
    snapshots: Vec<DatasetSnapshot>,
    inserted_at: Instant,
}

/// Read-through cache for per-dataset snapshot lists.
pub struct SnapshotCache {
    config: CacheConfig,
    entries: DashMap<(DatasetId, NaiveDate), CachedSnapshots>,
}

impl SnapshotCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { config, entries: DashMap::new() }
    }

    /// Cached snapshot list for `(dataset_id, as_of)`, or `None` when the
    /// entry is absent or expired. Expired entries are dropped on read.
    pub fn get(&self, dataset_id: DatasetId, as_of: NaiveDate) -> Option<Vec<DatasetSnapshot>> {
        let key = (dataset_id, as_of);
        if let Some(entry) = self.entries.get(&key) {
            if entry.inserted_at.elapsed().as_secs() < self.config.ttl_seconds {
                return Some(entry.snapshots.clone());
            }
        }
        self.entries.remove(&key);
        None
    }

    pub fn put(&self, dataset_id: DatasetId, as_of: NaiveDate, snapshots: Vec<DatasetSnapshot>) {
        self.entries.insert((dataset_id, as_of), CachedSnapshots {
            snapshots,
            inserted_at: Instant::now(),
        });
    }

    /// Publication hook from the ingestion collaborator. Drops every cached
    /// entry for the dataset whose `as_of` falls at or after the new
    /// snapshot's `effective_from`, so stale lists cannot outlive it.
    pub fn invalidate_on_publish(&self, dataset_id: DatasetId, effective_from: NaiveDate) {
        let before = self.entries.len();
        self.entries.retain(|(id, as_of), _| !(*id == dataset_id && *as_of >= effective_from));
        debug!(
            dataset = %dataset_id,
            %effective_from,
            dropped = before - self.entries.len(),
            "snapshot cache invalidated on publish"
        );
    }
}
