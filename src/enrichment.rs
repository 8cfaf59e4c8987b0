//! Reverse-geocoding enrichment of a location batch
//!
//! Stationary records are clustered by proximity and each cluster costs one
//! geocoding call, made on its representative. Calls are strictly sequential
//! and separated by a fixed pacing delay on top of the geocoder's own
//! backoff. Enrichment is best effort: it never fails the batch.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::clock::Sleeper;
use crate::cluster::group_points_by_distance;
use crate::geocoding::ReverseGeocoder;
use crate::models::{EnrichedLocation, GeoPoint, GeocodeResult, OverlandPayload};

pub const DEFAULT_CLUSTER_THRESHOLD_METERS: f64 = 50.0;
pub const DEFAULT_PACING_MS: u64 = 1000;

/// A location report the enrichment pass can read
pub trait LocationRecord {
    fn latitude(&self) -> f64;
    fn longitude(&self) -> f64;
    /// Whether the device was at rest when the report was captured
    fn is_stationary(&self) -> bool;
}

/// Tuning for one enrichment pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichmentSettings {
    pub cluster_threshold_meters: f64,
    /// Wait between two consecutive cluster lookups
    pub pacing: Duration,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            cluster_threshold_meters: DEFAULT_CLUSTER_THRESHOLD_METERS,
            pacing: Duration::from_millis(DEFAULT_PACING_MS),
        }
    }
}

/// Stationary records as candidate points, keyed by batch position
pub fn stationary_points<R: LocationRecord>(records: &[R]) -> Vec<GeoPoint> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.is_stationary())
        .map(|(index, record)| GeoPoint::new(index, record.latitude(), record.longitude()))
        .collect()
}

/// Resolve addresses for the stationary records of a batch.
///
/// Returns one slot per input record. With no geocoder configured the pass is
/// skipped and every slot is `None`.
#[instrument(skip_all, fields(records = records.len()))]
pub async fn enrich_locations<R: LocationRecord>(
    records: &[R],
    geocoder: Option<&dyn ReverseGeocoder>,
    sleeper: &dyn Sleeper,
    settings: &EnrichmentSettings,
) -> Vec<Option<GeocodeResult>> {
    let mut enrichments: Vec<Option<GeocodeResult>> = vec![None; records.len()];

    let Some(geocoder) = geocoder else {
        debug!("Geocoding not configured, skipping enrichment");
        return enrichments;
    };

    let candidates = stationary_points(records);
    if candidates.is_empty() {
        debug!("No stationary points in batch");
        return enrichments;
    }

    let clusters = group_points_by_distance(&candidates, settings.cluster_threshold_meters);
    info!(
        "Geocoding {} clusters for {} stationary points",
        clusters.len(),
        candidates.len()
    );

    let mut resolved = 0;
    for (position, cluster) in clusters.iter().enumerate() {
        if position > 0 {
            sleeper.sleep(settings.pacing).await;
        }

        let representative = cluster.representative();
        debug!(
            "Cluster {}/{}: {} members around ({})",
            position + 1,
            clusters.len(),
            cluster.members().len(),
            representative.format_coordinates()
        );

        match geocoder
            .reverse_geocode(representative.lat, representative.lon)
            .await
        {
            Some(result) => {
                for index in cluster.indices() {
                    enrichments[index] = Some(result.clone());
                }
                resolved += 1;
            }
            None => warn!(
                "No address for cluster at ({}), leaving {} records unenriched",
                representative.format_coordinates(),
                cluster.members().len()
            ),
        }
    }

    info!("Resolved {}/{} clusters", resolved, clusters.len());
    enrichments
}

/// Enrich an Overland payload and pair each feature with its result
pub async fn enrich_payload(
    payload: OverlandPayload,
    geocoder: Option<&dyn ReverseGeocoder>,
    sleeper: &dyn Sleeper,
    settings: &EnrichmentSettings,
) -> Vec<EnrichedLocation> {
    let enrichments = enrich_locations(&payload.locations, geocoder, sleeper, settings).await;

    payload
        .locations
        .into_iter()
        .zip(enrichments)
        .map(|(feature, enrichment)| {
            let (address, poi) = match enrichment {
                Some(GeocodeResult { address, poi }) => (Some(address), poi),
                None => (None, None),
            };
            EnrichedLocation {
                device_id: feature.device_id().to_string(),
                feature,
                address,
                poi,
            }
        })
        .collect()
}
