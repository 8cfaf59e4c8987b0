//! Reverse geocoding
//!
//! The enrichment pass talks to a [`ReverseGeocoder`]; [`NominatimClient`] is
//! the production implementation backed by an OpenStreetMap Nominatim server.

use async_trait::async_trait;

use crate::models::GeocodeResult;

pub mod nominatim;

pub use nominatim::{NominatimClient, NominatimConfig, ReverseGeocodeOptions};

/// Resolves a coordinate pair to an address.
///
/// Implementations never fail: anything short of a usable answer is `None`.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Option<GeocodeResult>;
}
