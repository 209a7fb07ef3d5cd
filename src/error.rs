//! Planner errors and the alert text shown for them

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("empty address")]
    EmptyAddress,

    #[error("no geocoding match for '{0}'")]
    AddressNotFound(String),

    #[error("'{address}' is {distance_km:.1} km from {center_name}, limit is {radius_km} km")]
    OutOfServiceArea {
        address: String,
        distance_km: f64,
        radius_km: f64,
        center_name: String,
    },

    #[error("no appointments to route")]
    NoStops,

    #[error("routing failed: {0}")]
    RouteFailed(String),

    #[error("index {index} out of range for {len} appointments")]
    InvalidIndex { index: usize, len: usize },

    #[error("waypoint order {order:?} is not a permutation of {len} appointments")]
    InvalidPermutation { order: Vec<usize>, len: usize },

    #[error("geocoding failed: {0}")]
    Geocoding(String),

    #[error("storage failed: {0}")]
    Storage(String),

    #[error("request superseded by a newer one")]
    Superseded,
}

impl PlannerError {
    /// Message for the user-facing alert
    pub fn user_message(&self) -> String {
        match self {
            PlannerError::EmptyAddress => "Please enter an address".to_string(),
            PlannerError::AddressNotFound(_) | PlannerError::Geocoding(_) => {
                "Could not find this address. Please check the address and try again.".to_string()
            }
            PlannerError::OutOfServiceArea { radius_km, center_name, .. } => format!(
                "This address is more than {}km from {}. Please enter an address within the service area.",
                radius_km, center_name
            ),
            PlannerError::NoStops => "Please add some appointments first".to_string(),
            PlannerError::RouteFailed(_) => "Could not calculate route. Please try again.".to_string(),
            PlannerError::InvalidIndex { index, len } => {
                format!("There is no appointment at position {} (list has {}).", index + 1, len)
            }
            PlannerError::InvalidPermutation { .. } => {
                "The routing service returned an unusable stop order.".to_string()
            }
            PlannerError::Storage(_) => "Could not save appointments.".to_string(),
            PlannerError::Superseded => "A newer request replaced this one.".to_string(),
        }
    }
}

pub type PlannerResult<T> = std::result::Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_service_area_message() {
        let err = PlannerError::OutOfServiceArea {
            address: "Cape Town".to_string(),
            distance_km: 800.0,
            radius_km: 100.0,
            center_name: "Kidd's Beach".to_string(),
        };
        assert_eq!(
            err.user_message(),
            "This address is more than 100km from Kidd's Beach. Please enter an address within the service area."
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = PlannerError::AddressNotFound("zzz".to_string());
        assert_eq!(
            err.user_message(),
            "Could not find this address. Please check the address and try again."
        );
    }

    #[test]
    fn test_invalid_index_message_is_one_based() {
        let err = PlannerError::InvalidIndex { index: 4, len: 3 };
        assert!(err.user_message().contains("position 5"));
    }
}
