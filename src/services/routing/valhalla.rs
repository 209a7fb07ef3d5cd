//! Valhalla routing engine client
//!
//! Valhalla API documentation:
//! https://valhalla.github.io/valhalla/api/turn-by-turn/api-reference/
//! https://valhalla.github.io/valhalla/api/optimized/api-reference/

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::RoutingService;
use crate::types::{Coordinates, RouteGeometry, RouteLeg, RouteRequest, RouteResult};

/// Valhalla client configuration
#[derive(Debug, Clone)]
pub struct ValhallaConfig {
    /// Base URL of Valhalla server (e.g., "http://localhost:8002")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ValhallaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

pub struct ValhallaClient {
    client: Client,
    config: ValhallaConfig,
}

impl ValhallaClient {
    pub fn new(config: ValhallaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// `/optimized_route` when the waypoints may be reordered, `/route` otherwise
    fn endpoint(request: &RouteRequest) -> &'static str {
        if request.optimize_waypoints && request.waypoints.len() > 1 {
            "optimized_route"
        } else {
            "route"
        }
    }

    pub(crate) fn build_route_body(&self, request: &RouteRequest) -> RouteBody {
        let locations = request
            .locations()
            .iter()
            .map(|c| ValhallaLocation {
                lat: c.lat,
                lon: c.lng,
                // Geocoded points are building centroids, often off the road edge
                radius: Some(500),
            })
            .collect();

        RouteBody {
            locations,
            costing: "auto".to_string(),
            units: "kilometers".to_string(),
            directions_type: "none".to_string(),
            costing_options: request.avoid_tolls.then(|| CostingOptions {
                auto: AutoCostingOptions { use_tolls: 0.0 },
            }),
        }
    }
}

#[async_trait]
impl RoutingService for ValhallaClient {
    async fn route(&self, request: &RouteRequest) -> Result<RouteResult> {
        let endpoint = Self::endpoint(request);
        let body = self.build_route_body(request);
        let url = format!("{}/{}", self.config.base_url, endpoint);

        debug!("Requesting {} from Valhalla for {} locations", endpoint, body.locations.len());

        let response = self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to Valhalla", endpoint))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Valhalla {} returned error {}: {}", endpoint, status, text);
        }

        let trip: TripResponse = response
            .json()
            .await
            .context("Failed to parse Valhalla route response")?;

        let result = trip_to_result(trip.trip, request)?;
        debug!(
            "Valhalla returned {} legs, waypoint order {:?}",
            result.legs.len(),
            result.waypoint_order
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "Valhalla"
    }
}

fn trip_to_result(trip: Trip, request: &RouteRequest) -> Result<RouteResult> {
    let waypoint_count = request.waypoints.len();

    let waypoint_order = if trip.locations.iter().any(|l| l.original_index.is_some()) {
        waypoint_order_from_locations(&trip.locations, waypoint_count)?
    } else {
        (0..waypoint_count).collect()
    };

    let legs = trip
        .legs
        .iter()
        .map(|leg| RouteLeg {
            distance_m: (leg.summary.length * 1000.0).round() as u64,
            duration_s: leg.summary.time.round() as u64,
        })
        .collect();

    let mut coordinates: Vec<[f64; 2]> = Vec::new();
    for (i, leg) in trip.legs.iter().enumerate() {
        let Some(shape) = leg.shape.as_deref() else { continue };
        let points = decode_polyline(shape, 6)?;
        // Consecutive legs share their joining point
        let skip = usize::from(i > 0 && !coordinates.is_empty());
        coordinates.extend(points.into_iter().skip(skip));
    }

    Ok(RouteResult {
        legs,
        waypoint_order,
        geometry: RouteGeometry { coordinates },
    })
}

/// Trip locations are [origin, waypoints in visiting order, destination];
/// `original_index` points back into the request's location list.
fn waypoint_order_from_locations(locations: &[TripLocation], waypoint_count: usize) -> Result<Vec<usize>> {
    if locations.len() != waypoint_count + 2 {
        anyhow::bail!(
            "Valhalla returned {} locations for {} waypoints",
            locations.len(),
            waypoint_count
        );
    }

    locations[1..=waypoint_count]
        .iter()
        .map(|l| {
            let original = l.original_index.context("Valhalla location missing original_index")?;
            if original == 0 || original > waypoint_count {
                anyhow::bail!("Valhalla moved a fixed endpoint (original_index {})", original);
            }
            Ok(original - 1)
        })
        .collect()
}

// Valhalla API types

#[derive(Debug, Serialize)]
pub(crate) struct RouteBody {
    locations: Vec<ValhallaLocation>,
    costing: String,
    units: String,
    directions_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    costing_options: Option<CostingOptions>,
}

#[derive(Debug, Serialize)]
struct CostingOptions {
    auto: AutoCostingOptions,
}

#[derive(Debug, Serialize)]
struct AutoCostingOptions {
    /// 0.0 avoids toll roads, 1.0 prefers them
    use_tolls: f64,
}

#[derive(Debug, Serialize, Clone)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    /// Radius in meters for snapping to roads
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TripResponse {
    trip: Trip,
}

#[derive(Debug, Deserialize)]
struct Trip {
    #[serde(default)]
    locations: Vec<TripLocation>,
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct TripLocation {
    #[serde(default)]
    original_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    summary: LegSummary,
    /// Encoded polyline shape
    #[serde(default)]
    shape: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegSummary {
    /// Kilometers (units = "kilometers")
    length: f64,
    /// Seconds
    time: f64,
}

/// Decode an encoded polyline into GeoJSON [lng, lat] pairs.
/// Valhalla uses precision 6 (Google uses 5).
fn decode_polyline(encoded: &str, precision: u32) -> Result<Vec<[f64; 2]>> {
    let factor = 10_f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut i = 0;

    let mut coordinates = Vec::new();
    let (mut lat, mut lng) = (0i64, 0i64);
    while i < bytes.len() {
        lat += next_polyline_delta(bytes, &mut i)?;
        lng += next_polyline_delta(bytes, &mut i)?;
        coordinates.push([lng as f64 / factor, lat as f64 / factor]);
    }

    Ok(coordinates)
}

/// One zig-zag encoded varint starting at `*pos`
fn next_polyline_delta(bytes: &[u8], pos: &mut usize) -> Result<i64> {
    let mut shift = 0;
    let mut result = 0i64;
    loop {
        if shift >= 64 {
            anyhow::bail!("Invalid polyline encoding");
        }
        let raw = *bytes.get(*pos).context("Invalid polyline encoding")?;
        if !(63..=126).contains(&raw) {
            anyhow::bail!("Invalid polyline encoding");
        }
        let byte = raw as i64 - 63;
        *pos += 1;
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
    }
    Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(waypoints: usize, optimize: bool) -> RouteRequest {
        RouteRequest {
            origin: Coordinates::new(-33.2739, 27.0486),
            destination: Coordinates::new(-33.2739, 27.0486),
            waypoints: (0..waypoints)
                .map(|i| Coordinates::new(-33.0 - i as f64 * 0.01, 27.5))
                .collect(),
            optimize_waypoints: optimize,
            avoid_tolls: true,
        }
    }

    #[test]
    fn test_valhalla_config_default() {
        let config = ValhallaConfig::default();
        assert_eq!(config.base_url, "http://localhost:8002");
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_valhalla_config_trims_trailing_slash() {
        let config = ValhallaConfig::new("http://valhalla:8002/");
        assert_eq!(config.base_url, "http://valhalla:8002");
    }

    #[test]
    fn test_endpoint_selection() {
        assert_eq!(ValhallaClient::endpoint(&request(3, true)), "optimized_route");
        assert_eq!(ValhallaClient::endpoint(&request(3, false)), "route");
        // Nothing to reorder with a single waypoint
        assert_eq!(ValhallaClient::endpoint(&request(1, true)), "route");
    }

    #[test]
    fn test_build_route_body_avoids_tolls() {
        let client = ValhallaClient::new(ValhallaConfig::default()).unwrap();
        let body = client.build_route_body(&request(2, true));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["locations"].as_array().unwrap().len(), 4);
        assert_eq!(json["costing"], "auto");
        assert_eq!(json["costing_options"]["auto"]["use_tolls"], 0.0);
        assert_eq!(json["locations"][0]["lon"], 27.0486);
    }

    #[test]
    fn test_build_route_body_without_toll_preference() {
        let client = ValhallaClient::new(ValhallaConfig::default()).unwrap();
        let mut req = request(1, false);
        req.avoid_tolls = false;

        let json = serde_json::to_value(client.build_route_body(&req)).unwrap();
        assert!(json.get("costing_options").is_none());
    }

    #[test]
    fn test_optimized_trip_maps_waypoint_order() {
        let raw = r#"{"trip":{
            "locations":[{"original_index":0},{"original_index":3},{"original_index":1},{"original_index":2},{"original_index":4}],
            "legs":[
                {"summary":{"length":1.5,"time":120.0}},
                {"summary":{"length":2.0,"time":180.0}},
                {"summary":{"length":0.5,"time":60.0}},
                {"summary":{"length":3.0,"time":240.0}}
            ]}}"#;
        let trip: TripResponse = serde_json::from_str(raw).unwrap();

        let result = trip_to_result(trip.trip, &request(3, true)).unwrap();

        assert_eq!(result.waypoint_order, vec![2, 0, 1]);
        assert_eq!(result.legs.len(), 4);
        assert_eq!(result.legs[0], RouteLeg { distance_m: 1_500, duration_s: 120 });
        assert!(result.geometry.is_empty());
    }

    #[test]
    fn test_plain_route_keeps_identity_order() {
        let raw = r#"{"trip":{"locations":[{},{},{}],"legs":[
            {"summary":{"length":1.0,"time":60.0}},
            {"summary":{"length":1.0,"time":60.0}}]}}"#;
        let trip: TripResponse = serde_json::from_str(raw).unwrap();

        let result = trip_to_result(trip.trip, &request(1, false)).unwrap();
        assert_eq!(result.waypoint_order, vec![0]);
    }

    #[test]
    fn test_optimized_trip_rejects_moved_endpoint() {
        let locations = vec![
            TripLocation { original_index: Some(1) },
            TripLocation { original_index: Some(0) },
            TripLocation { original_index: Some(2) },
        ];
        assert!(waypoint_order_from_locations(&locations, 1).is_err());
    }

    #[test]
    fn test_decode_polyline_precision_5() {
        // Reference string from the polyline algorithm documentation
        let points = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@", 5).unwrap();

        assert_eq!(points.len(), 3);
        assert!((points[0][1] - 38.5).abs() < 1e-6);
        assert!((points[0][0] + 120.2).abs() < 1e-6);
        assert!((points[2][1] - 43.252).abs() < 1e-6);
        assert!((points[2][0] + 126.453).abs() < 1e-6);
    }

    #[test]
    fn test_decode_polyline_truncated() {
        assert!(decode_polyline("_p~iF~ps|U_", 5).is_err());
    }

    #[test]
    fn test_decode_polyline_rejects_overlong_varint() {
        let err = decode_polyline("~~~~~~~~~~~~~~~~?", 6).unwrap_err();
        assert!(err.to_string().contains("Invalid polyline encoding"));
    }

    #[test]
    fn test_decode_polyline_rejects_out_of_range_bytes() {
        assert!(decode_polyline("_p~iF ps|U", 5).is_err());
    }

    #[tokio::test]
    #[ignore = "Requires running Valhalla server"]
    async fn test_valhalla_optimized_round_trip() {
        let client = ValhallaClient::new(ValhallaConfig::new("http://localhost:8002")).unwrap();

        let result = client.route(&request(3, true)).await.unwrap();

        assert_eq!(result.legs.len(), 4);
        let mut order = result.waypoint_order.clone();
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
