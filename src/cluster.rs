//! Greedy proximity clustering of candidate points
//!
//! Points are grouped around the first unassigned point seen, in input order.
//! Membership is decided solely by distance to that representative, so two
//! members of one cluster may lie up to twice the threshold apart. This is
//! not transitive single-linkage: a point close to a non-representative
//! member but far from the representative opens its own cluster.

use std::collections::HashSet;

use haversine::{Location as HaversineLocation, Units, distance};
use tracing::debug;

use crate::models::{Cluster, GeoPoint};

/// Great-circle distance in meters between two decimal-degree coordinates,
/// on a sphere of radius 6 371 km.
#[must_use]
pub fn haversine_distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let from = HaversineLocation {
        latitude: lat1,
        longitude: lon1,
    };
    let to = HaversineLocation {
        latitude: lat2,
        longitude: lon2,
    };
    distance(from, to, Units::Kilometers) * 1000.0
}

/// Partition `points` into clusters whose members lie within
/// `threshold_meters` of the cluster's representative.
///
/// Every point ends up in exactly one cluster and clusters are returned in
/// the order their representatives appear in the input.
#[must_use]
pub fn group_points_by_distance(points: &[GeoPoint], threshold_meters: f64) -> Vec<Cluster> {
    let mut clusters = Vec::new();
    let mut assigned: HashSet<usize> = HashSet::with_capacity(points.len());

    for point in points {
        if !assigned.insert(point.index) {
            continue;
        }

        let mut cluster = Cluster::new(*point);
        for other in points {
            if assigned.contains(&other.index) {
                continue;
            }
            let meters = haversine_distance_meters(point.lat, point.lon, other.lat, other.lon);
            if meters <= threshold_meters {
                cluster.push(*other);
                assigned.insert(other.index);
            }
        }

        clusters.push(cluster);
    }

    debug!(
        "Grouped {} points into {} clusters (threshold {}m)",
        points.len(),
        clusters.len(),
        threshold_meters
    );
    clusters
}
