//! Routing service for directions and waypoint optimization
//!
//! Uses Valhalla for production, mock for tests and offline use.

mod valhalla;

pub use valhalla::{ValhallaClient, ValhallaConfig};

use anyhow::Result;
use async_trait::async_trait;

use crate::services::geo;
use crate::types::{Coordinates, RouteGeometry, RouteLeg, RouteRequest, RouteResult};

/// Routing service trait for abstraction (Valhalla, mock, etc.)
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Driving route from origin through the waypoints to destination.
    /// With `optimize_waypoints` the service picks the waypoint order and
    /// reports it in `RouteResult::waypoint_order`.
    async fn route(&self, request: &RouteRequest) -> Result<RouteResult>;

    /// Get service name for logging
    fn name(&self) -> &str;
}

/// Offline routing: haversine × road coefficient, nearest-neighbour ordering
#[derive(Default)]
pub struct MockRoutingService;

impl MockRoutingService {
    pub fn new() -> Self {
        Self
    }

    /// Greedy order: always drive to the closest unvisited waypoint
    fn nearest_neighbour_order(origin: &Coordinates, waypoints: &[Coordinates]) -> Vec<usize> {
        let mut remaining: Vec<usize> = (0..waypoints.len()).collect();
        let mut order = Vec::with_capacity(waypoints.len());
        let mut current = *origin;

        while !remaining.is_empty() {
            let (pos, _) = remaining
                .iter()
                .enumerate()
                .map(|(pos, &i)| (pos, geo::haversine_distance(&current, &waypoints[i])))
                .fold((0, f64::INFINITY), |best, candidate| {
                    if candidate.1 < best.1 { candidate } else { best }
                });
            let next = remaining.remove(pos);
            current = waypoints[next];
            order.push(next);
        }

        order
    }
}

#[async_trait]
impl RoutingService for MockRoutingService {
    async fn route(&self, request: &RouteRequest) -> Result<RouteResult> {
        let waypoint_order = if request.optimize_waypoints {
            Self::nearest_neighbour_order(&request.origin, &request.waypoints)
        } else {
            (0..request.waypoints.len()).collect()
        };

        let mut path = Vec::with_capacity(request.waypoints.len() + 2);
        path.push(request.origin);
        path.extend(waypoint_order.iter().map(|&i| request.waypoints[i]));
        path.push(request.destination);

        let legs = path
            .windows(2)
            .map(|pair| RouteLeg {
                distance_m: (geo::road_distance(&pair[0], &pair[1]) * 1000.0) as u64,
                duration_s: geo::travel_time_seconds(&pair[0], &pair[1]) as u64,
            })
            .collect();

        Ok(RouteResult {
            legs,
            waypoint_order,
            geometry: RouteGeometry::from_coordinates(&path),
        })
    }

    fn name(&self) -> &str {
        "MockRouting"
    }
}

/// Create routing service with automatic Valhalla detection and fallback
///
/// Tries to connect to Valhalla if URL is provided. Falls back to mock
/// routing service if Valhalla is unavailable or URL is not configured.
pub async fn create_routing_service_with_fallback(
    valhalla_url: Option<String>,
) -> Box<dyn RoutingService> {
    use tracing::{info, warn};

    if let Some(url) = valhalla_url {
        match check_valhalla_health(&url).await {
            Ok(()) => match ValhallaClient::new(ValhallaConfig::new(&url)) {
                Ok(client) => {
                    info!("Valhalla routing service available at {}", url);
                    return Box::new(client);
                }
                Err(e) => warn!("Could not build Valhalla client: {:#}", e),
            },
            Err(e) => {
                warn!("Valhalla not available at {}: {}. Falling back to mock routing.", url, e);
            }
        }
    }

    info!("Using mock routing service (Valhalla not configured or unavailable)");
    Box::new(MockRoutingService::new())
}

/// Check if Valhalla is healthy by making a simple status request
async fn check_valhalla_health(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let url = format!("{}/status", base_url.trim_end_matches('/'));
    let response = client.get(&url).send().await?;

    if response.status().is_success() {
        Ok(())
    } else {
        anyhow::bail!("Valhalla returned status {}", response.status())
    }
}
