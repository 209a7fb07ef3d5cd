use crate::types::Coordinates;

/// Storage key under which the stop list is persisted
pub const STORAGE_KEY: &str = "barklegps_appointments";

/// Default service-area center: Kidd's Beach, Eastern Cape
pub const SERVICE_CENTER: Coordinates = Coordinates::new(-33.2739, 27.0486);

pub const SERVICE_CENTER_NAME: &str = "Kidd's Beach";

pub const DEFAULT_SERVICE_RADIUS_KM: f64 = 100.0;

pub const GEOLOCATION_TIMEOUT_MS: u64 = 10_000;

pub const GEOLOCATION_MAX_AGE_MS: u64 = 300_000;

pub const DEFAULT_STORAGE_PATH: &str = "./barklegps_storage.json";

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Number of candidates returned by address autocomplete
pub const SUGGESTION_LIMIT: usize = 5;
