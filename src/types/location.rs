//! Device location types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// State of the device position lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationStatus {
    #[default]
    Unknown,
    Getting,
    Found,
    Denied,
    Unavailable,
}

impl LocationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            LocationStatus::Unknown => "unknown",
            LocationStatus::Getting => "getting",
            LocationStatus::Found => "found",
            LocationStatus::Denied => "denied",
            LocationStatus::Unavailable => "unavailable",
        }
    }

    /// Text for the status indicator
    pub const fn label(self) -> &'static str {
        match self {
            LocationStatus::Unknown => "Location: Unknown",
            LocationStatus::Getting => "Location: Getting...",
            LocationStatus::Found => "Location: Using Current",
            LocationStatus::Denied | LocationStatus::Unavailable => "Location: Using Default",
        }
    }
}

/// Options for a position lookup
#[derive(Debug, Clone, Copy)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    /// Give up on the provider after this long
    pub timeout: Duration,
    /// A cached fix younger than this is reused without asking the provider
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_millis(crate::defaults::GEOLOCATION_TIMEOUT_MS),
            maximum_age: Duration::from_millis(crate::defaults::GEOLOCATION_MAX_AGE_MS),
        }
    }
}
