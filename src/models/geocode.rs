//! Reverse-geocoding results

use serde::{Deserialize, Serialize};

/// Address and point-of-interest label resolved for one coordinate pair
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GeocodeResult {
    /// Full display name as returned by the geocoder
    pub address: String,
    /// Short label of what occupies the location (amenity, shop, ...)
    pub poi: Option<String>,
}

impl GeocodeResult {
    #[must_use]
    pub fn new(address: impl Into<String>, poi: Option<String>) -> Self {
        Self {
            address: address.into(),
            poi,
        }
    }
}
