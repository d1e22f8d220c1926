//! Cross-provider fallback policy for comparison scenarios.
//!
//! Order: (a) the identical comparison ZIP for every provider; (b) the
//! provider's own service ZIP; (c) stepwise radius expansion over the
//! configured ladder (default 25 -> 50 -> 75 -> 100 miles, capped at the
//! last entry), selecting the nearest usable ZIP at each step. Every
//! fallback or expansion emits a trace note with the chosen ZIP and
//! distance.

use crate::error::{GeographyError, Result};
use crate::resolver::{GeoResolver, ResolvedGeography};
use chrono::NaiveDate;
use reference_data::{ReferenceStore, TraceNote, TraceStage};
use tracing::{debug, warn};

impl GeoResolver {
    /// Resolve geography for one compared provider under the fallback
    /// policy.
    pub async fn resolve_for_provider(
        &self,
        store: &dyn ReferenceStore,
        comparison_zip: &str,
        provider_service_zip: &str,
        as_of: NaiveDate,
    ) -> Result<ResolvedGeography> {
        // (a) identical comparison ZIP
        match self.resolve(store, comparison_zip, as_of).await {
            Ok(geo) => return Ok(geo),
            Err(GeographyError::Store(err)) => return Err(GeographyError::Store(err)),
            Err(err) => {
                debug!(comparison_zip, %err, "comparison ZIP unusable, trying service ZIP");
            }
        }

        // (b) the provider's own service ZIP
        match self.resolve(store, provider_service_zip, as_of).await {
            Ok(mut geo) => {
                geo.notes.insert(
                    0,
                    TraceNote::new(
                        TraceStage::Geography,
                        format!(
                            "comparison ZIP {comparison_zip} unusable; \
                             fell back to provider service ZIP {provider_service_zip}"
                        ),
                    ),
                );
                return Ok(geo);
            }
            Err(GeographyError::Store(err)) => return Err(GeographyError::Store(err)),
            Err(err) => {
                debug!(provider_service_zip, %err, "service ZIP unusable, expanding radius");
            }
        }

        // (c) stepwise radius expansion, nearest usable ZIP per step
        for &radius in &self.config().expansion_radii_miles {
            let mut neighbors = store.get_zips_within(provider_service_zip, radius).await?;
            neighbors.sort_by(|a, b| {
                a.distance_miles
                    .partial_cmp(&b.distance_miles)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.zip5.cmp(&b.zip5))
            });

            for neighbor in neighbors {
                match self.resolve(store, &neighbor.zip5, as_of).await {
                    Ok(mut geo) => {
                        geo.notes.insert(
                            0,
                            TraceNote::new(
                                TraceStage::Geography,
                                format!(
                                    "expanded search to {radius} miles around \
                                     {provider_service_zip}; using ZIP {} at {:.1} miles",
                                    neighbor.zip5, neighbor.distance_miles
                                ),
                            ),
                        );
                        return Ok(geo);
                    }
                    Err(GeographyError::Store(err)) => return Err(GeographyError::Store(err)),
                    Err(_) => continue,
                }
            }
        }

        warn!(comparison_zip, provider_service_zip, "geography unresolvable after expansion");
        Err(GeographyError::Unresolvable {
            zip5: provider_service_zip.to_string(),
            attempted: format!(
                "comparison ZIP {comparison_zip}, service ZIP, then radius expansion to \
                 {} miles",
                self.config().expansion_radii_miles.last().copied().unwrap_or(0)
            ),
        })
    }
}
