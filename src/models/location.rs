//! Geo-tagged points and the clusters they are grouped into

use serde::{Deserialize, Serialize};

use crate::error::GeotrailError;

/// A candidate point taken from an inbound batch
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Position of the originating record within its batch
    pub index: usize,
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn new(index: usize, lat: f64, lon: f64) -> Self {
        Self { index, lat, lon }
    }

    /// Build a point from user input, rejecting out-of-range coordinates
    pub fn validated(index: usize, lat: f64, lon: f64) -> crate::Result<Self> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeotrailError::validation(format!(
                "Latitude must be between -90 and 90, got: {lat}"
            )));
        }

        if !(-180.0..=180.0).contains(&lon) {
            return Err(GeotrailError::validation(format!(
                "Longitude must be between -180 and 180, got: {lon}"
            )));
        }

        Ok(Self::new(index, lat, lon))
    }

    /// Format point as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.5}, {:.5}", self.lat, self.lon)
    }
}

/// A non-empty group of points sharing one representative.
///
/// The representative is always the first member: the point that opened the
/// cluster. It is never re-elected, even when a later member sits closer to
/// the geometric centre.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    members: Vec<GeoPoint>,
}

impl Cluster {
    /// Open a cluster around its representative
    #[must_use]
    pub fn new(representative: GeoPoint) -> Self {
        Self {
            members: vec![representative],
        }
    }

    pub(crate) fn push(&mut self, point: GeoPoint) {
        self.members.push(point);
    }

    /// The point whose coordinates are geocoded for the whole cluster
    #[must_use]
    pub fn representative(&self) -> &GeoPoint {
        &self.members[0]
    }

    #[must_use]
    pub fn members(&self) -> &[GeoPoint] {
        &self.members
    }

    /// Batch indices of every member, in insertion order
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().map(|p| p.index)
    }
}
