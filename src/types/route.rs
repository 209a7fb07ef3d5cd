//! Route types

use serde::Serialize;

use super::Coordinates;

/// Request handed to the routing collaborator
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub origin: Coordinates,
    pub destination: Coordinates,
    /// Intermediate stops, in the order the user currently has them
    pub waypoints: Vec<Coordinates>,
    /// Let the routing service reorder `waypoints`
    pub optimize_waypoints: bool,
    pub avoid_tolls: bool,
}

impl RouteRequest {
    /// All locations in travel order: origin, waypoints, destination
    pub fn locations(&self) -> Vec<Coordinates> {
        let mut locations = Vec::with_capacity(self.waypoints.len() + 2);
        locations.push(self.origin);
        locations.extend(self.waypoints.iter().copied());
        locations.push(self.destination);
        locations
    }
}

/// One leg between two consecutive locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    /// Distance in meters
    pub distance_m: u64,
    /// Duration in seconds
    pub duration_s: u64,
}

/// Route geometry as GeoJSON coordinates
/// Coordinates are in [longitude, latitude] order (GeoJSON standard)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteGeometry {
    pub coordinates: Vec<[f64; 2]>,
}

impl RouteGeometry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Straight lines through the given points
    pub fn from_coordinates(coords: &[Coordinates]) -> Self {
        Self {
            coordinates: coords.iter().map(|c| [c.lng, c.lat]).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// GeoJSON `Feature` holding the route as a `LineString`
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "LineString",
                "coordinates": self.coordinates,
            }
        })
    }
}

/// Answer from the routing collaborator
#[derive(Debug, Clone)]
pub struct RouteResult {
    pub legs: Vec<RouteLeg>,
    /// `waypoint_order[i]` is the index into the request's waypoints that is
    /// visited i-th. Identity when optimization was not requested.
    pub waypoint_order: Vec<usize>,
    pub geometry: RouteGeometry,
}

impl RouteResult {
    pub fn summary(&self, stop_count: usize) -> RouteSummary {
        RouteSummary {
            total_distance_m: self.legs.iter().map(|l| l.distance_m).sum(),
            total_duration_s: self.legs.iter().map(|l| l.duration_s).sum(),
            stop_count,
        }
    }
}

/// Totals shown to the user after a route was calculated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub total_distance_m: u64,
    pub total_duration_s: u64,
    pub stop_count: usize,
}

impl RouteSummary {
    /// "1h 25m", or "25m" under an hour
    pub fn time_text(&self) -> String {
        let hours = self.total_duration_s / 3600;
        let minutes = (self.total_duration_s % 3600) / 60;
        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}m", minutes)
        }
    }

    /// Kilometers with one decimal, e.g. "42.3 km"
    pub fn distance_text(&self) -> String {
        format!("{:.1} km", self.total_distance_m as f64 / 1000.0)
    }
}
