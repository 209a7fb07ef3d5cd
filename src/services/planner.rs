//! Route planner: the stop list plus everything the user flows need around it
//!
//! Owns the stop list, the location tracker and the last route summary behind
//! one lock, and the geocoding/routing/location collaborators beside it.
//! The lock is never held across an `.await`, so calls may overlap:
//! - adds go through a FIFO lane and land in the order they were submitted
//! - route requests are latest-wins; an answer for an older request, or for
//!   a list that changed while it was computed, is dropped as `Superseded`

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{PlannerError, PlannerResult};
use crate::services::geo::ServiceArea;
use crate::services::geocoding::{Geocoder, GeocodingResult};
use crate::services::geolocation::{lookup_location, LocationProvider, LocationTracker};
use crate::services::navigation::{build_links, NavigationLinks};
use crate::services::routing::RoutingService;
use crate::services::sequencer::{RequestSequencer, Ticket};
use crate::services::stop_list::StopListManager;
use crate::types::{
    Appointment, Coordinates, LocationStatus, ResolvedAddress, RouteGeometry, RouteRequest,
    RouteResult, RouteSummary,
};

struct PlannerState {
    stops: StopListManager,
    location: LocationTracker,
    route_summary: Option<RouteSummary>,
    route_geometry: RouteGeometry,
}

impl PlannerState {
    fn clear_route(&mut self) {
        self.route_summary = None;
        self.route_geometry = RouteGeometry::empty();
    }
}

pub struct RoutePlanner {
    state: Mutex<PlannerState>,
    geocoder: Box<dyn Geocoder>,
    router: Box<dyn RoutingService>,
    location_provider: Option<Box<dyn LocationProvider>>,
    service_area: Option<ServiceArea>,
    avoid_tolls: bool,
    route_requests: RequestSequencer,
    add_lane: tokio::sync::Mutex<()>,
}

impl RoutePlanner {
    /// `fallback_start` is used as the route origin until a live position is found
    pub fn new(
        stops: StopListManager,
        geocoder: Box<dyn Geocoder>,
        router: Box<dyn RoutingService>,
        fallback_start: Coordinates,
    ) -> Self {
        Self {
            state: Mutex::new(PlannerState {
                stops,
                location: LocationTracker::new(fallback_start),
                route_summary: None,
                route_geometry: RouteGeometry::empty(),
            }),
            geocoder,
            router,
            location_provider: None,
            service_area: None,
            avoid_tolls: true,
            route_requests: RequestSequencer::new(),
            add_lane: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_service_area(mut self, area: ServiceArea) -> Self {
        self.service_area = Some(area);
        self
    }

    pub fn with_location_provider(mut self, provider: Box<dyn LocationProvider>) -> Self {
        self.location_provider = Some(provider);
        self
    }

    pub fn with_avoid_tolls(mut self, avoid_tolls: bool) -> Self {
        self.avoid_tolls = avoid_tolls;
        self
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        self.state.lock().stops.appointments().to_vec()
    }

    pub fn appointment_count(&self) -> usize {
        self.state.lock().stops.len()
    }

    /// Totals of the last calculated route; None once the list is emptied
    pub fn route_summary(&self) -> Option<RouteSummary> {
        self.state.lock().route_summary
    }

    pub fn route_geometry(&self) -> RouteGeometry {
        self.state.lock().route_geometry.clone()
    }

    pub fn location_status(&self) -> LocationStatus {
        self.state.lock().location.status()
    }

    pub fn start_location(&self) -> Coordinates {
        self.state.lock().location.start_location()
    }

    pub fn geocoder_name(&self) -> &'static str {
        self.geocoder.name()
    }

    pub fn router_name(&self) -> &str {
        self.router.name()
    }

    /// Look the device position up again. Failures only change the status.
    pub async fn refresh_location(&self) -> LocationStatus {
        let (options, has_cached_fix) = {
            let mut state = self.state.lock();
            state.location.mark_getting();
            (*state.location.options(), state.location.cached_fix().is_some())
        };

        let outcome = lookup_location(self.location_provider.as_deref(), options, has_cached_fix).await;
        self.state.lock().location.apply(outcome)
    }

    /// Address autocomplete candidates
    pub async fn suggest(&self, query: &str) -> PlannerResult<Vec<GeocodingResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.geocoder
            .suggest(query, crate::defaults::SUGGESTION_LIMIT)
            .await
            .map_err(|e| PlannerError::Geocoding(format!("{:#}", e)))
    }

    /// Geocode `input` and append it as a new stop
    pub async fn add_appointment(&self, input: &str) -> PlannerResult<Appointment> {
        let address = input.trim();
        if address.is_empty() {
            return Err(PlannerError::EmptyAddress);
        }

        let appointment = {
            let _lane = self.add_lane.lock().await;

            let result = self
                .geocoder
                .geocode(address)
                .await
                .map_err(|e| {
                    warn!("Geocoding '{}' failed: {:#}", address, e);
                    PlannerError::Geocoding(format!("{:#}", e))
                })?
                .ok_or_else(|| {
                    info!("No geocoding match for '{}'", address);
                    PlannerError::AddressNotFound(address.to_string())
                })?;

            self.insert(ResolvedAddress {
                address: result.display_name,
                coordinates: result.coordinates,
            })?
        };

        self.preview_if_single().await;
        Ok(appointment)
    }

    /// Append a candidate picked from `suggest` without geocoding it again
    pub async fn add_selected(&self, candidate: GeocodingResult) -> PlannerResult<Appointment> {
        let appointment = {
            let _lane = self.add_lane.lock().await;
            self.insert(ResolvedAddress {
                address: candidate.display_name,
                coordinates: candidate.coordinates,
            })?
        };

        self.preview_if_single().await;
        Ok(appointment)
    }

    fn insert(&self, resolved: ResolvedAddress) -> PlannerResult<Appointment> {
        if let Some(area) = &self.service_area {
            if !area.contains(&resolved.coordinates) {
                let distance_km = area.distance_from_center(&resolved.coordinates);
                info!("Rejecting '{}', {:.1} km from {}", resolved.address, distance_km, area.center_name);
                return Err(PlannerError::OutOfServiceArea {
                    address: resolved.address,
                    distance_km,
                    radius_km: area.radius_km,
                    center_name: area.center_name.clone(),
                });
            }
        }

        let appointment = self.state.lock().stops.add(resolved)?;
        info!("Added appointment {}: {}", appointment.id, appointment.address);
        Ok(appointment)
    }

    /// Delete by id; unknown ids are ignored
    pub async fn delete_appointment(&self, id: i64) -> PlannerResult<bool> {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.stops.remove(id)?;
            if removed && state.stops.is_empty() {
                state.clear_route();
                self.route_requests.cancel_all();
            }
            removed
        };

        if removed {
            self.preview_if_single().await;
        }
        Ok(removed)
    }

    /// Move the stop at `from` to `to` (0-based)
    pub fn move_appointment(&self, from: usize, to: usize) -> PlannerResult<()> {
        self.state.lock().stops.reorder(from, to)
    }

    /// Empty the list if `confirm` agrees. Nothing is asked when already empty.
    pub fn clear_all(&self, confirm: impl FnOnce(usize) -> bool) -> PlannerResult<bool> {
        let count = self.appointment_count();
        if count == 0 || !confirm(count) {
            return Ok(false);
        }

        let mut state = self.state.lock();
        state.stops.clear()?;
        state.clear_route();
        self.route_requests.cancel_all();
        Ok(true)
    }

    /// Round trip from the start location through every stop, in the order
    /// the routing service finds best. The list is reordered to match.
    pub async fn optimize_route(&self) -> PlannerResult<RouteSummary> {
        let (stops, origin, revision) = {
            let state = self.state.lock();
            (
                state.stops.appointments().to_vec(),
                state.location.start_location(),
                state.stops.revision(),
            )
        };

        match stops.len() {
            0 => return Err(PlannerError::NoStops),
            1 => return self.show_single_appointment(&stops[0]).await,
            _ => {}
        }

        let ticket = self.route_requests.issue();
        let request = RouteRequest {
            origin,
            destination: origin,
            waypoints: stops.iter().map(Appointment::coordinates).collect(),
            optimize_waypoints: true,
            avoid_tolls: self.avoid_tolls,
        };
        let result = self.request_route(&ticket, &request).await?;

        let mut state = self.state.lock();
        if !self.route_requests.is_current(&ticket) || state.stops.revision() != revision {
            info!("Discarding route for an outdated appointment list");
            return Err(PlannerError::Superseded);
        }
        state.stops.apply_optimized_order(&result.waypoint_order)?;

        let summary = result.summary(stops.len());
        info!(
            "Optimized {} stops: {} / {}",
            stops.len(),
            summary.time_text(),
            summary.distance_text()
        );
        state.route_summary = Some(summary);
        state.route_geometry = result.geometry;
        Ok(summary)
    }

    /// Route from the start location straight to one stop
    pub async fn show_single_appointment(&self, appointment: &Appointment) -> PlannerResult<RouteSummary> {
        let ticket = self.route_requests.issue();
        let request = RouteRequest {
            origin: self.start_location(),
            destination: appointment.coordinates(),
            waypoints: Vec::new(),
            optimize_waypoints: false,
            avoid_tolls: self.avoid_tolls,
        };
        let result = self.request_route(&ticket, &request).await?;

        let mut state = self.state.lock();
        if !self.route_requests.is_current(&ticket) || state.stops.get(appointment.id).is_none() {
            return Err(PlannerError::Superseded);
        }

        let summary = result.summary(1);
        state.route_summary = Some(summary);
        state.route_geometry = result.geometry;
        Ok(summary)
    }

    /// Preview the route when exactly one stop is left; failures are only logged
    async fn preview_if_single(&self) {
        let single = {
            let state = self.state.lock();
            match state.stops.appointments() {
                [only] => Some(only.clone()),
                _ => None,
            }
        };

        if let Some(appointment) = single {
            if let Err(e) = self.show_single_appointment(&appointment).await {
                debug!("Single stop preview skipped: {}", e);
            }
        }
    }

    async fn request_route(&self, ticket: &Ticket, request: &RouteRequest) -> PlannerResult<RouteResult> {
        debug!(
            "Route request #{} via {} with {} waypoints",
            ticket.generation(),
            self.router.name(),
            request.waypoints.len()
        );

        tokio::select! {
            _ = ticket.superseded() => Err(PlannerError::Superseded),
            result = self.router.route(request) => result.map_err(|e| {
                warn!("Routing failed: {:#}", e);
                PlannerError::RouteFailed(format!("{:#}", e))
            }),
        }
    }

    /// Deep links for the current order, starting at the start location
    pub fn navigation_links(&self) -> Option<NavigationLinks> {
        let state = self.state.lock();
        let stops: Vec<Coordinates> = state.stops.appointments().iter().map(Appointment::coordinates).collect();
        build_links(state.location.start_location(), &stops)
    }
}
