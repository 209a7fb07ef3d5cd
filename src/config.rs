//! Configuration management

use anyhow::{self, Context, Result};

use crate::defaults;
use crate::types::Coordinates;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// File backing the local key/value storage
    pub storage_path: String,

    /// Geocoder backend: "mock" or "nominatim"
    pub geocoder_backend: String,

    /// Nominatim API URL (for geocoding)
    pub nominatim_url: String,

    /// Valhalla routing engine URL (optional, falls back to mock if unavailable)
    pub valhalla_url: Option<String>,

    /// Reference point for the service-area check and fallback start location
    pub service_center: Coordinates,

    /// Human-readable name of the service center, used in alerts
    pub service_center_name: String,

    /// Maximum distance of a stop from the service center; None disables the check
    pub service_radius_km: Option<f64>,

    /// Ask the routing service to avoid toll roads
    pub avoid_tolls: bool,

    /// Fixed device position; None means geolocation is unavailable
    pub device_location: Option<Coordinates>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let storage_path = std::env::var("STORAGE_PATH")
            .unwrap_or_else(|_| defaults::DEFAULT_STORAGE_PATH.to_string());

        let geocoder_backend = std::env::var("GEOCODER_BACKEND")
            .unwrap_or_else(|_| "mock".to_string());

        let nominatim_url = std::env::var("NOMINATIM_URL")
            .unwrap_or_else(|_| defaults::DEFAULT_NOMINATIM_URL.to_string());

        let valhalla_url = std::env::var("VALHALLA_URL").ok().filter(|s| !s.is_empty());

        let service_center = Coordinates::new(
            env_f64("SERVICE_CENTER_LAT")?.unwrap_or(defaults::SERVICE_CENTER.lat),
            env_f64("SERVICE_CENTER_LNG")?.unwrap_or(defaults::SERVICE_CENTER.lng),
        );

        let service_center_name = std::env::var("SERVICE_CENTER_NAME")
            .unwrap_or_else(|_| defaults::SERVICE_CENTER_NAME.to_string());

        let service_radius_km = match std::env::var("SERVICE_RADIUS_KM") {
            Ok(raw) => parse_radius(&raw)?,
            Err(_) => Some(defaults::DEFAULT_SERVICE_RADIUS_KM),
        };

        let avoid_tolls = match std::env::var("AVOID_TOLLS") {
            Ok(raw) => parse_bool(&raw)
                .with_context(|| format!("AVOID_TOLLS must be true or false, got '{}'", raw))?,
            Err(_) => true,
        };

        let device_location = match (env_f64("CURRENT_LAT")?, env_f64("CURRENT_LNG")?) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            (None, None) => None,
            _ => anyhow::bail!("CURRENT_LAT and CURRENT_LNG must be set together"),
        };

        if !(-90.0..=90.0).contains(&service_center.lat) || !(-180.0..=180.0).contains(&service_center.lng) {
            anyhow::bail!(
                "Service center {},{} is not a valid coordinate",
                service_center.lat,
                service_center.lng
            );
        }

        Ok(Self {
            storage_path,
            geocoder_backend,
            nominatim_url,
            valhalla_url,
            service_center,
            service_center_name,
            service_radius_km,
            avoid_tolls,
            device_location,
        })
    }
}

fn env_f64(name: &str) -> Result<Option<f64>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => parse_finite(name, &raw).map(Some),
        _ => Ok(None),
    }
}

fn parse_finite(name: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number, got '{}'", name, raw))?;
    if !value.is_finite() {
        anyhow::bail!("{} must be a finite number, got '{}'", name, raw);
    }
    Ok(value)
}

/// "0", "off" and "none" disable the radius check
fn parse_radius(raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if matches!(raw.to_ascii_lowercase().as_str(), "off" | "none" | "") {
        return Ok(None);
    }
    let radius = parse_finite("SERVICE_RADIUS_KM", raw)
        .with_context(|| format!("SERVICE_RADIUS_KM must be a number or 'off', got '{}'", raw))?;
    if radius < 0.0 {
        anyhow::bail!("SERVICE_RADIUS_KM must not be negative (got {})", radius);
    }
    Ok(if radius == 0.0 { None } else { Some(radius) })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_radius_number() {
        assert_eq!(parse_radius("100").unwrap(), Some(100.0));
        assert_eq!(parse_radius(" 42.5 ").unwrap(), Some(42.5));
    }

    #[test]
    fn test_parse_radius_disabled() {
        assert_eq!(parse_radius("0").unwrap(), None);
        assert_eq!(parse_radius("off").unwrap(), None);
        assert_eq!(parse_radius("None").unwrap(), None);
    }

    #[test]
    fn test_parse_radius_rejects_garbage() {
        assert!(parse_radius("far").is_err());
        assert!(parse_radius("-5").is_err());
    }

    #[test]
    fn test_parse_radius_rejects_non_finite() {
        assert!(parse_radius("NaN").is_err());
        assert!(parse_radius("inf").is_err());
    }

    #[test]
    fn test_parse_finite_coordinate() {
        assert_eq!(parse_finite("CURRENT_LAT", " -33.5 ").unwrap(), -33.5);
        assert!(parse_finite("CURRENT_LAT", "NaN").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_defaults_to_kidds_beach() {
        std::env::remove_var("SERVICE_CENTER_LAT");
        std::env::remove_var("SERVICE_CENTER_LNG");
        std::env::remove_var("SERVICE_RADIUS_KM");

        let config = Config::from_env().unwrap();
        assert_eq!(config.service_center, defaults::SERVICE_CENTER);
        assert_eq!(config.service_radius_km, Some(100.0));
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_valhalla_url_some_when_set() {
        std::env::set_var("VALHALLA_URL", "http://localhost:8002");

        let config = Config::from_env().unwrap();
        assert_eq!(config.valhalla_url, Some("http://localhost:8002".to_string()));

        std::env::remove_var("VALHALLA_URL");
    }
}
