//! ZIP-to-locality resolution.
//!
//! A ZIP may map to several locality/CBSA candidates (MAC or county
//! overlap). The resolver always returns the full candidate set plus one
//! deterministically chosen `used` record: highest share weight first,
//! then lexically lowest locality id. The `ambiguous` flag is set when
//! more than one candidate sits above the materiality threshold.

use crate::config::GeoConfig;
use crate::error::{GeographyError, Result};
use chrono::NaiveDate;
use reference_data::{GeographyRecord, ReferenceStore, TraceNote, TraceStage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One candidate with its resolution-time `used` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCandidate {
    pub record: GeographyRecord,
    pub used: bool,
}

/// Outcome of resolving one ZIP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedGeography {
    pub candidates: Vec<GeoCandidate>,
    pub used: GeographyRecord,
    pub ambiguous: bool,
    /// Fallback/expansion notes for the run trace
    pub notes: Vec<TraceNote>,
}

pub struct GeoResolver {
    config: GeoConfig,
}

impl GeoResolver {
    pub fn new(config: GeoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeoConfig {
        &self.config
    }

    /// Resolve a single ZIP as of `as_of`.
    pub async fn resolve(
        &self,
        store: &dyn ReferenceStore,
        zip5: &str,
        as_of: NaiveDate,
    ) -> Result<ResolvedGeography> {
        if zip5.len() != 5 || !zip5.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GeographyError::InvalidZip(zip5.to_string()));
        }

        let mut candidates: Vec<GeographyRecord> = store
            .get_geography_candidates(zip5)
            .await?
            .into_iter()
            .filter(|r| r.effective_at(as_of))
            .collect();

        if candidates.is_empty() {
            return Err(GeographyError::Unresolvable {
                zip5: zip5.to_string(),
                attempted: "no locality candidate effective at valuation date".into(),
            });
        }

        // Deterministic tie-break: highest share, then lowest locality id.
        candidates.sort_by(|a, b| {
            b.share
                .partial_cmp(&a.share)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.locality_id.cmp(&b.locality_id))
        });

        let material = candidates
            .iter()
            .filter(|c| c.share >= self.config.materiality_threshold)
            .count();
        let ambiguous = material > 1;
        let used = candidates[0].clone();

        let mut notes = Vec::new();
        if ambiguous {
            notes.push(TraceNote::new(
                TraceStage::Geography,
                format!(
                    "ZIP {zip5} has {material} material locality candidates; \
                     selected {} by share/locality tie-break",
                    used.locality_id
                ),
            ));
        }
        debug!(zip5, locality = %used.locality_id, ambiguous, "geography resolved");

        let used_id = used.locality_id.clone();
        Ok(ResolvedGeography {
            candidates: candidates
                .into_iter()
                .map(|record| {
                    let is_used = record.locality_id == used_id;
                    GeoCandidate { record, used: is_used }
                })
                .collect(),
            used,
            ambiguous,
            notes,
        })
    }
}
