//! Device position lookup with fallback to the service center

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::types::{Coordinates, LocationStatus, PositionOptions};

/// Source of the device's current position
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self, options: &PositionOptions) -> Result<Coordinates>;

    fn name(&self) -> &'static str;
}

/// Always reports the same position (configured via CURRENT_LAT/CURRENT_LNG)
pub struct StaticLocationProvider {
    position: Coordinates,
}

impl StaticLocationProvider {
    pub fn new(position: Coordinates) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationProvider for StaticLocationProvider {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Coordinates> {
        Ok(self.position)
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[derive(Debug, Clone, Copy)]
struct Fix {
    position: Coordinates,
    taken_at: Instant,
}

/// Current position state plus the fallback used when there is none
#[derive(Debug, Clone)]
pub struct LocationTracker {
    status: LocationStatus,
    last_fix: Option<Fix>,
    fallback: Coordinates,
    options: PositionOptions,
}

impl LocationTracker {
    pub fn new(fallback: Coordinates) -> Self {
        Self::with_options(fallback, PositionOptions::default())
    }

    pub fn with_options(fallback: Coordinates, options: PositionOptions) -> Self {
        Self {
            status: LocationStatus::Unknown,
            last_fix: None,
            fallback,
            options,
        }
    }

    pub fn status(&self) -> LocationStatus {
        self.status
    }

    pub fn options(&self) -> &PositionOptions {
        &self.options
    }

    /// Where routes start: the live position when found, else the fallback
    pub fn start_location(&self) -> Coordinates {
        match (self.status, self.last_fix) {
            (LocationStatus::Found, Some(fix)) => fix.position,
            _ => self.fallback,
        }
    }

    /// Fix young enough to reuse without asking the provider again
    pub fn cached_fix(&self) -> Option<Coordinates> {
        self.last_fix
            .filter(|f| f.taken_at.elapsed() < self.options.maximum_age)
            .map(|f| f.position)
    }

    /// Reuse the last fix as-is; its age keeps counting from when it was taken
    pub fn mark_found(&mut self) {
        self.status = LocationStatus::Found;
    }

    pub fn mark_getting(&mut self) {
        self.status = LocationStatus::Getting;
    }

    pub fn mark_unavailable(&mut self) {
        info!("Geolocation unavailable, using default start location");
        self.status = LocationStatus::Unavailable;
    }

    pub fn record_fix(&mut self, position: Coordinates) {
        debug!("Location found at {},{}", position.lat, position.lng);
        self.last_fix = Some(Fix {
            position,
            taken_at: Instant::now(),
        });
        self.status = LocationStatus::Found;
    }

    pub fn record_error(&mut self, error: &anyhow::Error) {
        warn!("Location error: {:#}", error);
        self.status = LocationStatus::Denied;
    }

    /// Fold the result of a lookup into this tracker
    pub fn apply(&mut self, outcome: LocationOutcome) -> LocationStatus {
        match outcome {
            LocationOutcome::Unavailable => self.mark_unavailable(),
            LocationOutcome::Cached => self.mark_found(),
            LocationOutcome::Fix(position) => self.record_fix(position),
            LocationOutcome::Failed(e) => self.record_error(&e),
        }
        self.status
    }
}

/// Result of one position lookup, applied later with `LocationTracker::apply`
#[derive(Debug)]
pub enum LocationOutcome {
    Unavailable,
    /// The tracker's last fix is still young enough
    Cached,
    Fix(Coordinates),
    Failed(anyhow::Error),
}

/// Ask `provider` for a position, bounded by `options.timeout`.
/// Skips the provider when `has_cached_fix` is set.
pub async fn lookup_location(
    provider: Option<&dyn LocationProvider>,
    options: PositionOptions,
    has_cached_fix: bool,
) -> LocationOutcome {
    let Some(provider) = provider else {
        return LocationOutcome::Unavailable;
    };
    if has_cached_fix {
        return LocationOutcome::Cached;
    }

    match tokio::time::timeout(options.timeout, provider.current_position(&options)).await {
        Ok(Ok(position)) => LocationOutcome::Fix(position),
        Ok(Err(e)) => LocationOutcome::Failed(e),
        Err(_) => LocationOutcome::Failed(anyhow::anyhow!(
            "{} provider timed out after {:?}",
            provider.name(),
            options.timeout
        )),
    }
}
