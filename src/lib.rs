//! `geotrail` - reverse-geocoding enrichment for Overland GPS batches
//!
//! Stationary location reports are grouped by proximity and each group is
//! resolved to an address with a single, rate-limit aware call to a
//! Nominatim server.

pub mod clock;
pub mod cluster;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod geocoding;
pub mod logging;
pub mod models;

// Re-export core types for public API
pub use clock::{Sleeper, TokioSleeper};
pub use cluster::{group_points_by_distance, haversine_distance_meters};
pub use config::GeotrailConfig;
pub use enrichment::{EnrichmentSettings, LocationRecord, enrich_locations, enrich_payload};
pub use error::{GeocodeFailure, GeotrailError};
pub use geocoding::{NominatimClient, NominatimConfig, ReverseGeocodeOptions, ReverseGeocoder};
pub use models::{Cluster, EnrichedLocation, GeoPoint, GeocodeResult, OverlandPayload};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, GeotrailError>;
