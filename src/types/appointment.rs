//! Appointment (stop) types

use serde::{Deserialize, Serialize};

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `lat,lng` with six decimals, the form navigation apps expect
    pub fn to_query_value(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lng)
    }
}

/// A stop the user wants to visit.
///
/// Serialized exactly as `{id, address, lat, lng}`; this is the stored format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    /// Creation time in milliseconds since the epoch, unique within a list
    pub id: i64,
    /// Formatted address returned by the geocoder
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

impl Appointment {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// An address already resolved to coordinates, ready to become an appointment
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAddress {
    pub address: String,
    pub coordinates: Coordinates,
}
