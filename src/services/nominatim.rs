//! Nominatim geocoding client

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::Coordinates;

/// Nominatim API response
#[derive(Debug, Deserialize)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
}

impl NominatimResult {
    pub fn coordinates(&self) -> Result<Coordinates> {
        let lat: f64 = self.lat.parse().context("Invalid latitude")?;
        let lng: f64 = self.lon.parse().context("Invalid longitude")?;
        Ok(Coordinates { lat, lng })
    }
}

/// A matched place: formatted address plus position
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub display_name: String,
    pub coordinates: Coordinates,
}

/// Nominatim geocoding client
pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("barkle-gps/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn search_url(&self, query: &str, limit: usize) -> String {
        format!(
            "{}/search?q={}&format=json&limit={}",
            self.base_url,
            urlencoding::encode(query),
            limit
        )
    }

    /// Free-form search, best match first. 404 means no matches; any other
    /// non-success status (throttling, server errors) is an error.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>> {
        let response = self.client
            .get(self.search_url(query, limit))
            .send()
            .await
            .context("Failed to send geocoding request")?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("Nominatim returned 404 for '{}'", query);
            return Ok(Vec::new());
        }
        if !status.is_success() {
            anyhow::bail!("Nominatim returned {}", status);
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .context("Failed to parse geocoding response")?;

        results
            .into_iter()
            .map(|r| {
                Ok(Place {
                    coordinates: r.coordinates()?,
                    display_name: r.display_name,
                })
            })
            .collect()
    }

}
