//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Road distance coefficient (straight line to road)
pub const ROAD_COEFFICIENT: f64 = 1.3;

/// Average speed in km/h for travel time estimation
pub const AVERAGE_SPEED_KMH: f64 = 50.0;

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Estimate road distance from straight-line distance
pub fn road_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    haversine_distance(from, to) * ROAD_COEFFICIENT
}

/// Estimate travel time in seconds
pub fn travel_time_seconds(from: &Coordinates, to: &Coordinates) -> f64 {
    road_distance(from, to) / AVERAGE_SPEED_KMH * 3600.0
}

/// Circular service area around a fixed reference point
#[derive(Debug, Clone)]
pub struct ServiceArea {
    pub center: Coordinates,
    pub center_name: String,
    pub radius_km: f64,
}

impl ServiceArea {
    pub fn new(center: Coordinates, center_name: impl Into<String>, radius_km: f64) -> Self {
        Self {
            center,
            center_name: center_name.into(),
            radius_km,
        }
    }

    /// Straight-line distance from the center in kilometers
    pub fn distance_from_center(&self, point: &Coordinates) -> f64 {
        haversine_distance(&self.center, point)
    }

    /// Points exactly on the boundary are inside
    pub fn contains(&self, point: &Coordinates) -> bool {
        self.distance_from_center(point) <= self.radius_km
    }
}
