//! Geocoding abstraction layer
//!
//! - `MockGeocoder`: deterministic coordinates around the service center, no network
//! - `RateLimitedNominatimGeocoder`: Nominatim with request spacing and a circuit breaker
//!
//! Selected via GEOCODER_BACKEND ("mock" or "nominatim").

use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::Config;
use crate::services::nominatim::{NominatimClient, Place};
use crate::types::Coordinates;

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best match for a free-form address, None if nothing matched
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>>;

    /// Up to `limit` candidates for address autocomplete
    async fn suggest(&self, query: &str, limit: usize) -> Result<Vec<GeocodingResult>>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodingResult {
    pub coordinates: Coordinates,
    /// Formatted address returned by the geocoder
    pub display_name: String,
}

impl From<Place> for GeocodingResult {
    fn from(place: Place) -> Self {
        Self {
            coordinates: place.coordinates,
            display_name: place.display_name,
        }
    }
}

// ==========================================================================
// MockGeocoder
// ==========================================================================

/// Half-width of the box mock coordinates fall into, in degrees
const MOCK_SPREAD_DEG: f64 = 0.4;

/// Returns deterministic fake coordinates near a center point.
///
/// Addresses containing "nowhere" never match, to exercise the miss path.
pub struct MockGeocoder {
    center: Coordinates,
}

impl MockGeocoder {
    pub fn new(center: Coordinates) -> Self {
        Self { center }
    }

    fn hash_to_coordinates(&self, address: &str) -> Coordinates {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        address.trim().to_lowercase().hash(&mut hasher);
        let hash = hasher.finish();

        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lng_normalized = ((hash & 0xFFFF_FFFF) as f64) / (u32::MAX as f64);

        Coordinates {
            lat: self.center.lat - MOCK_SPREAD_DEG + lat_normalized * 2.0 * MOCK_SPREAD_DEG,
            lng: self.center.lng - MOCK_SPREAD_DEG + lng_normalized * 2.0 * MOCK_SPREAD_DEG,
        }
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>> {
        let address = address.trim();
        if address.is_empty() || address.to_lowercase().contains("nowhere") {
            return Ok(None);
        }
        Ok(Some(GeocodingResult {
            coordinates: self.hash_to_coordinates(address),
            display_name: format!("{} (mock)", address),
        }))
    }

    async fn suggest(&self, query: &str, limit: usize) -> Result<Vec<GeocodingResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.geocode(query).await?.into_iter().collect())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================================================
// RateLimiter
// ==========================================================================

/// Enforces a minimum interval between calls
pub struct RateLimiter {
    last_call: tokio::sync::Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: tokio::sync::Mutex::new(None),
            min_interval,
        }
    }

    /// Wait until it's safe to make another call
    pub async fn wait(&self) {
        // Held across the sleep so waiting callers queue up in order
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

// ==========================================================================
// CircuitBreaker
// ==========================================================================

#[derive(Debug, Default)]
struct BreakerState {
    failures: u32,
    last_failure: Option<Instant>,
}

/// Stops calls to a failing service until `recovery_time` has passed
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    threshold: u32,
    recovery_time: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery_time: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            threshold,
            recovery_time,
        }
    }

    /// Open means calls are blocked. After recovery_time one retry is let through (half-open).
    pub fn is_open(&self) -> bool {
        let state = self.state.lock();
        if state.failures < self.threshold {
            return false;
        }
        match state.last_failure {
            Some(at) => at.elapsed() < self.recovery_time,
            None => true,
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failures += 1;
        state.last_failure = Some(Instant::now());
    }

    pub fn record_success(&self) {
        *self.state.lock() = BreakerState::default();
    }
}

// ==========================================================================
// RateLimitedNominatimGeocoder
// ==========================================================================

/// Nominatim's usage policy allows 1 req/s
const DEFAULT_RATE_LIMIT_MS: u64 = 1500;

const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 3;

const DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS: u64 = 300;

pub struct RateLimitedNominatimGeocoder {
    client: NominatimClient,
    rate_limiter: RateLimiter,
    pub(crate) circuit_breaker: CircuitBreaker,
}

impl RateLimitedNominatimGeocoder {
    pub fn with_config(
        base_url: &str,
        rate_limit_interval: Duration,
        circuit_breaker_threshold: u32,
        circuit_breaker_recovery: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: NominatimClient::new(base_url)?,
            rate_limiter: RateLimiter::new(rate_limit_interval),
            circuit_breaker: CircuitBreaker::new(circuit_breaker_threshold, circuit_breaker_recovery),
        })
    }

    /// Base URL from config, tuning knobs from environment variables
    pub fn from_config(config: &Config) -> Result<Self> {
        let rate_limit_ms = env_or("NOMINATIM_RATE_LIMIT_MS", DEFAULT_RATE_LIMIT_MS);
        let cb_threshold = env_or("NOMINATIM_CB_THRESHOLD", DEFAULT_CIRCUIT_BREAKER_THRESHOLD);
        let cb_recovery_secs = env_or("NOMINATIM_CB_RECOVERY_SECS", DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS);

        Self::with_config(
            &config.nominatim_url,
            Duration::from_millis(rate_limit_ms),
            cb_threshold,
            Duration::from_secs(cb_recovery_secs),
        )
    }

    async fn guarded_search(&self, query: &str, limit: usize) -> Result<Vec<Place>> {
        if self.circuit_breaker.is_open() {
            tracing::warn!("Circuit breaker is open, rejecting geocoding request");
            anyhow::bail!("Geocoding service temporarily unavailable (circuit breaker open)");
        }

        self.rate_limiter.wait().await;

        match self.client.search(query, limit).await {
            Ok(places) => {
                // No match is not a service failure
                self.circuit_breaker.record_success();
                Ok(places)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                tracing::error!("Geocoding failed: {:#}", e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Geocoder for RateLimitedNominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>> {
        Ok(self.guarded_search(address, 1).await?.into_iter().next().map(Into::into))
    }

    async fn suggest(&self, query: &str, limit: usize) -> Result<Vec<GeocodingResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.guarded_search(query, limit).await?.into_iter().map(Into::into).collect())
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Build the geocoder named by `config.geocoder_backend`
pub fn create_geocoder(config: &Config) -> Result<Box<dyn Geocoder>> {
    match config.geocoder_backend.as_str() {
        "mock" => {
            tracing::info!("Using MockGeocoder");
            Ok(Box::new(MockGeocoder::new(config.service_center)))
        }
        "nominatim" => {
            tracing::info!("Using RateLimitedNominatimGeocoder at {}", config.nominatim_url);
            Ok(Box::new(RateLimitedNominatimGeocoder::from_config(config)?))
        }
        other => {
            tracing::warn!("Unknown GEOCODER_BACKEND '{}', using mock", other);
            Ok(Box::new(MockGeocoder::new(config.service_center)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::SERVICE_CENTER;
    use crate::services::geo::haversine_distance;

    #[tokio::test]
    async fn mock_geocoder_returns_deterministic_coordinates() {
        let geocoder = MockGeocoder::new(SERVICE_CENTER);

        let first = geocoder.geocode("12 Main Road").await.unwrap().unwrap();
        let second = geocoder.geocode("12 Main Road").await.unwrap().unwrap();

        assert_eq!(first.coordinates, second.coordinates);
    }

    #[tokio::test]
    async fn mock_geocoder_different_addresses_differ() {
        let geocoder = MockGeocoder::new(SERVICE_CENTER);

        let a = geocoder.geocode("12 Main Road").await.unwrap().unwrap();
        let b = geocoder.geocode("7 Beach Drive").await.unwrap().unwrap();

        assert_ne!(a.coordinates, b.coordinates);
    }

    #[tokio::test]
    async fn mock_geocoder_stays_inside_service_area() {
        let geocoder = MockGeocoder::new(SERVICE_CENTER);

        for address in ["1 A St", "2 B Rd", "3 C Ave", "4 D Lane", "5 E Close"] {
            let result = geocoder.geocode(address).await.unwrap().unwrap();
            let distance = haversine_distance(&SERVICE_CENTER, &result.coordinates);
            assert!(distance < 100.0, "{} is {} km out", address, distance);
        }
    }

    #[tokio::test]
    async fn mock_geocoder_misses_nowhere() {
        let geocoder = MockGeocoder::new(SERVICE_CENTER);
        assert!(geocoder.geocode("Road to Nowhere").await.unwrap().is_none());
        assert!(geocoder.suggest("nowhere", 5).await.unwrap().is_empty());
    }

    #[test]
    fn mock_geocoder_name_is_mock() {
        assert_eq!(MockGeocoder::new(SERVICE_CENTER).name(), "mock");
    }

    #[tokio::test]
    async fn rate_limiter_enforces_minimum_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(100));

        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(50), "First call should be immediate");

        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn circuit_breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn circuit_breaker_resets_on_success() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn circuit_breaker_half_opens_after_recovery_time() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(50));
        breaker.record_failure();
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn nominatim_geocoder_rejects_when_circuit_breaker_open() {
        let geocoder = RateLimitedNominatimGeocoder::with_config(
            "http://127.0.0.1:9",
            Duration::from_millis(10),
            1,
            Duration::from_secs(300),
        )
        .unwrap();

        geocoder.circuit_breaker.record_failure();

        let err = geocoder.geocode("Test").await.unwrap_err();
        assert!(err.to_string().contains("circuit breaker"));
    }

    /// Local HTTP server answering every request with `status_line` and `body`
    async fn serve_fixed(status_line: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn nominatim_throttling_opens_circuit_breaker() {
        let url = serve_fixed("429 Too Many Requests", "").await;
        let geocoder = RateLimitedNominatimGeocoder::with_config(
            &url,
            Duration::from_millis(1),
            1,
            Duration::from_secs(300),
        )
        .unwrap();

        assert!(geocoder.geocode("12 Main Road").await.is_err());
        assert!(geocoder.circuit_breaker.is_open());

        let err = geocoder.geocode("12 Main Road").await.unwrap_err();
        assert!(err.to_string().contains("circuit breaker"));
    }

    #[tokio::test]
    async fn nominatim_server_error_is_not_a_miss() {
        let url = serve_fixed("503 Service Unavailable", "").await;
        let geocoder = RateLimitedNominatimGeocoder::with_config(
            &url,
            Duration::from_millis(1),
            3,
            Duration::from_secs(300),
        )
        .unwrap();

        let err = geocoder.geocode("12 Main Road").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn nominatim_empty_array_is_a_miss() {
        let url = serve_fixed("200 OK", "[]").await;
        let geocoder = RateLimitedNominatimGeocoder::with_config(
            &url,
            Duration::from_millis(1),
            1,
            Duration::from_secs(300),
        )
        .unwrap();

        assert!(geocoder.geocode("Road to Nowhere").await.unwrap().is_none());
        assert!(!geocoder.circuit_breaker.is_open());
    }
}
