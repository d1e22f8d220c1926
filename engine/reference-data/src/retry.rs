//! Bounded retry with backoff for collaborator fetches.

use crate::config::RetryConfig;
use crate::error::{Result, StoreError};
use crate::store::ReferenceStore;
use crate::types::{
    AddendumBEntry, AspPriceEntry, Cents, CrosswalkEntry, DatasetId, DatasetSnapshot,
    DmeposFeeEntry, GeographyRecord, GpciEntry, IppsRates, NadacPriceEntry, RvuEntry, SnapshotKey,
    ZipDistance,
};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::warn;

/// Run a collaborator fetch under the configured timeout and retry budget.
///
/// Each attempt gets `fetch_timeout_ms`; timeouts and transient upstream
/// failures are retried with doubling backoff. Once `max_attempts` is
/// exhausted the caller sees `UpstreamUnavailable` with the attempt count
/// and the fetch context.
pub async fn fetch_with_retry<T, F, Fut>(config: &RetryConfig, context: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = Duration::from_millis(config.initial_backoff_ms);
    let budget = Duration::from_millis(config.fetch_timeout_ms);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let outcome = match timeout(budget, op()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout { context: context.to_string() }),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(StoreError::Corrupt(msg)) => return Err(StoreError::Corrupt(msg)),
            Err(err) => {
                if attempt >= config.max_attempts {
                    return Err(StoreError::UpstreamUnavailable {
                        attempts: attempt,
                        context: context.to_string(),
                    });
                }
                warn!(context, attempt, %err, "reference fetch failed, backing off");
                sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
}

/// [`ReferenceStore`] adapter that puts every fetch, typed row lookups
/// included, under the configured timeout and retry budget. A hung
/// collaborator surfaces as `UpstreamUnavailable` instead of stalling the
/// run.
pub struct RetryingStore {
    inner: Arc<dyn ReferenceStore>,
    config: RetryConfig,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn ReferenceStore>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl ReferenceStore for RetryingStore {
    async fn get_dataset_snapshots(&self, dataset_id: DatasetId) -> Result<Vec<DatasetSnapshot>> {
        fetch_with_retry(&self.config, &format!("snapshots of {dataset_id}"), || {
            self.inner.get_dataset_snapshots(dataset_id)
        })
        .await
    }

    async fn get_geography_candidates(&self, zip5: &str) -> Result<Vec<GeographyRecord>> {
        fetch_with_retry(&self.config, &format!("geography for {zip5}"), || {
            self.inner.get_geography_candidates(zip5)
        })
        .await
    }

    async fn get_rural_flag(&self, zip5: &str) -> Result<Option<bool>> {
        fetch_with_retry(&self.config, &format!("rural flag for {zip5}"), || {
            self.inner.get_rural_flag(zip5)
        })
        .await
    }

    async fn get_zips_within(&self, zip5: &str, radius_miles: u32) -> Result<Vec<ZipDistance>> {
        fetch_with_retry(&self.config, &format!("ZIPs within {radius_miles}mi of {zip5}"), || {
            self.inner.get_zips_within(zip5, radius_miles)
        })
        .await
    }

    async fn get_cbsa_for_ccn(&self, ccn: &str) -> Result<Option<String>> {
        fetch_with_retry(&self.config, &format!("CBSA for CCN {ccn}"), || {
            self.inner.get_cbsa_for_ccn(ccn)
        })
        .await
    }

    async fn get_rvu(&self, key: &SnapshotKey, code: &str) -> Result<Option<RvuEntry>> {
        fetch_with_retry(&self.config, &format!("RVU {code}"), || self.inner.get_rvu(key, code))
            .await
    }

    async fn get_gpci(&self, key: &SnapshotKey, locality_id: &str) -> Result<Option<GpciEntry>> {
        fetch_with_retry(&self.config, &format!("GPCI {locality_id}"), || {
            self.inner.get_gpci(key, locality_id)
        })
        .await
    }

    async fn get_conversion_factor(&self, key: &SnapshotKey) -> Result<Option<f64>> {
        fetch_with_retry(&self.config, "conversion factor", || {
            self.inner.get_conversion_factor(key)
        })
        .await
    }

    async fn get_addendum_b(
        &self,
        key: &SnapshotKey,
        code: &str,
    ) -> Result<Option<AddendumBEntry>> {
        fetch_with_retry(&self.config, &format!("Addendum B {code}"), || {
            self.inner.get_addendum_b(key, code)
        })
        .await
    }

    async fn get_wage_index(&self, key: &SnapshotKey, cbsa: &str) -> Result<Option<f64>> {
        fetch_with_retry(&self.config, &format!("wage index {cbsa}"), || {
            self.inner.get_wage_index(key, cbsa)
        })
        .await
    }

    async fn get_asc_fee(&self, key: &SnapshotKey, code: &str) -> Result<Option<Cents>> {
        fetch_with_retry(&self.config, &format!("ASC fee {code}"), || {
            self.inner.get_asc_fee(key, code)
        })
        .await
    }

    async fn get_ipps_rates(&self, key: &SnapshotKey) -> Result<Option<IppsRates>> {
        fetch_with_retry(&self.config, "IPPS rates", || self.inner.get_ipps_rates(key)).await
    }

    async fn get_drg_weight(&self, key: &SnapshotKey, drg: &str) -> Result<Option<f64>> {
        fetch_with_retry(&self.config, &format!("DRG weight {drg}"), || {
            self.inner.get_drg_weight(key, drg)
        })
        .await
    }

    async fn get_clfs_fee(&self, key: &SnapshotKey, code: &str) -> Result<Option<Cents>> {
        fetch_with_retry(&self.config, &format!("CLFS fee {code}"), || {
            self.inner.get_clfs_fee(key, code)
        })
        .await
    }

    async fn get_dmepos_fee(
        &self,
        key: &SnapshotKey,
        code: &str,
    ) -> Result<Option<DmeposFeeEntry>> {
        fetch_with_retry(&self.config, &format!("DMEPOS fee {code}"), || {
            self.inner.get_dmepos_fee(key, code)
        })
        .await
    }

    async fn get_asp_price(&self, key: &SnapshotKey, code: &str) -> Result<Option<AspPriceEntry>> {
        fetch_with_retry(&self.config, &format!("ASP price {code}"), || {
            self.inner.get_asp_price(key, code)
        })
        .await
    }

    async fn get_nadac_price(
        &self,
        key: &SnapshotKey,
        ndc: &str,
    ) -> Result<Option<NadacPriceEntry>> {
        fetch_with_retry(&self.config, &format!("NADAC price {ndc}"), || {
            self.inner.get_nadac_price(key, ndc)
        })
        .await
    }

    async fn get_crosswalk(&self, key: &SnapshotKey, ndc: &str) -> Result<Option<CrosswalkEntry>> {
        fetch_with_retry(&self.config, &format!("crosswalk {ndc}"), || {
            self.inner.get_crosswalk(key, ndc)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_config() -> RetryConfig {
        RetryConfig { max_attempts: 3, fetch_timeout_ms: 50, initial_backoff_ms: 1 }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fetch_with_retry(&quick_config(), "gpci snapshots", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Timeout { context: "gpci snapshots".into() })
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_upstream_unavailable() {
        let result: Result<u32> = fetch_with_retry(&quick_config(), "rvu snapshots", || async {
            Err(StoreError::Timeout { context: "rvu snapshots".into() })
        })
        .await;
        match result {
            Err(StoreError::UpstreamUnavailable { attempts, context }) => {
                assert_eq!(attempts, 3);
                assert_eq!(context, "rvu snapshots");
            }
            other => panic!("expected UpstreamUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn corrupt_rows_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = fetch_with_retry(&quick_config(), "addendum b", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Corrupt("bad rate".into())) }
        })
        .await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// A collaborator that never answers row lookups.
    struct StalledStore;

    #[async_trait]
    impl ReferenceStore for StalledStore {
        async fn get_dataset_snapshots(&self, _: DatasetId) -> Result<Vec<DatasetSnapshot>> {
            Ok(Vec::new())
        }
        async fn get_geography_candidates(&self, _: &str) -> Result<Vec<GeographyRecord>> {
            Ok(Vec::new())
        }
        async fn get_rural_flag(&self, _: &str) -> Result<Option<bool>> {
            Ok(None)
        }
        async fn get_zips_within(&self, _: &str, _: u32) -> Result<Vec<ZipDistance>> {
            Ok(Vec::new())
        }
        async fn get_cbsa_for_ccn(&self, _: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn get_rvu(&self, _: &SnapshotKey, _: &str) -> Result<Option<RvuEntry>> {
            std::future::pending().await
        }
        async fn get_gpci(&self, _: &SnapshotKey, _: &str) -> Result<Option<GpciEntry>> {
            Ok(None)
        }
        async fn get_conversion_factor(&self, _: &SnapshotKey) -> Result<Option<f64>> {
            Ok(None)
        }
        async fn get_addendum_b(&self, _: &SnapshotKey, _: &str) -> Result<Option<AddendumBEntry>> {
            Ok(None)
        }
        async fn get_wage_index(&self, _: &SnapshotKey, _: &str) -> Result<Option<f64>> {
            Ok(None)
        }
        async fn get_asc_fee(&self, _: &SnapshotKey, _: &str) -> Result<Option<Cents>> {
            Ok(None)
        }
        async fn get_ipps_rates(&self, _: &SnapshotKey) -> Result<Option<IppsRates>> {
            Ok(None)
        }
        async fn get_drg_weight(&self, _: &SnapshotKey, _: &str) -> Result<Option<f64>> {
            Ok(None)
        }
        async fn get_clfs_fee(&self, _: &SnapshotKey, _: &str) -> Result<Option<Cents>> {
            Ok(None)
        }
        async fn get_dmepos_fee(&self, _: &SnapshotKey, _: &str) -> Result<Option<DmeposFeeEntry>> {
            Ok(None)
        }
        async fn get_asp_price(&self, _: &SnapshotKey, _: &str) -> Result<Option<AspPriceEntry>> {
            Ok(None)
        }
        async fn get_nadac_price(&self, _: &SnapshotKey, _: &str) -> Result<Option<NadacPriceEntry>> {
            Ok(None)
        }
        async fn get_crosswalk(&self, _: &SnapshotKey, _: &str) -> Result<Option<CrosswalkEntry>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn hung_row_lookup_fails_bounded_through_adapter() {
        let store = RetryingStore::new(Arc::new(StalledStore), quick_config());
        let key = SnapshotKey {
            dataset_id: DatasetId::MpfsRvu,
            effective_from: chrono::NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        };
        let result = store.get_rvu(&key, "99213").await;
        match result {
            Err(StoreError::UpstreamUnavailable { attempts, context }) => {
                assert_eq!(attempts, 3);
                assert!(context.contains("99213"));
            }
            other => panic!("expected UpstreamUnavailable, got {other:?}"),
        }
        // Lookups the collaborator does answer pass straight through
        assert_eq!(store.get_gpci(&key, "01").await.unwrap(), None);
    }
}
