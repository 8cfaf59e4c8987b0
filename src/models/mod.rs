//! Data models for geotrail
//!
//! This module contains the domain models organized by concern:
//! - Location: candidate points and the clusters built from them
//! - Geocode: reverse-geocoding results
//! - Overland: the inbound payload and its enriched counterpart

pub mod geocode;
pub mod location;
pub mod overland;

// Re-export all public types for convenient access
pub use geocode::GeocodeResult;
pub use location::{Cluster, GeoPoint};
pub use overland::{EnrichedLocation, Feature, FeatureProperties, OverlandPayload};
