//! Overland GPS payload model
//!
//! Tracking clients post batches of GeoJSON `Feature`s, each a `Point` with
//! `[lon, lat]` coordinates and a bag of sensor properties. Shape checks
//! (literal `type` tags, two-element coordinates, RFC 3339 timestamps) are
//! enforced by deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enrichment::LocationRecord;

/// Device id recorded when a feature does not carry one
pub const UNKNOWN_DEVICE_ID: &str = "unknown";

/// Motion tag marking a device at rest
pub const STATIONARY: &str = "stationary";

/// A batch of locations as posted by an Overland client
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OverlandPayload {
    pub locations: Vec<Feature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip: Option<Value>,
}

impl OverlandPayload {
    /// Parse a raw request body
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    Feature,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Point,
}

/// A single location report
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: FeatureType,
    pub geometry: PointGeometry,
    pub properties: FeatureProperties,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: GeometryType,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FeatureProperties {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_state: Option<String>,
    /// Motion-state tags, e.g. `["driving"]` or `["stationary"]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
}

impl Feature {
    /// Build a point feature; mostly useful for tests and fixtures
    #[must_use]
    pub fn point(lat: f64, lon: f64, properties: FeatureProperties) -> Self {
        Self {
            kind: FeatureType::Feature,
            geometry: PointGeometry {
                kind: GeometryType::Point,
                coordinates: [lon, lat],
            },
            properties,
        }
    }

    #[must_use]
    pub fn device_id(&self) -> &str {
        self.properties
            .device_id
            .as_deref()
            .unwrap_or(UNKNOWN_DEVICE_ID)
    }
}

impl LocationRecord for Feature {
    fn latitude(&self) -> f64 {
        self.geometry.coordinates[1]
    }

    fn longitude(&self) -> f64 {
        self.geometry.coordinates[0]
    }

    fn is_stationary(&self) -> bool {
        self.properties
            .motion
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|tag| tag == STATIONARY))
    }
}

/// A feature paired with its (optional) enrichment, ready to be persisted
#[derive(Debug, Serialize, Clone)]
pub struct EnrichedLocation {
    pub device_id: String,
    pub feature: Feature,
    pub address: Option<String>,
    pub poi: Option<String>,
}
