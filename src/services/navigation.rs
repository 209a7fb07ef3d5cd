//! Deep links into external navigation apps

use serde::Serialize;
use tracing::warn;

use crate::types::Coordinates;

/// Google Maps URLs accept at most this many intermediate waypoints
pub const GOOGLE_MAPS_MAX_WAYPOINTS: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationLinks {
    pub google_maps: String,
    pub apple_maps: String,
    /// Waze only navigates to a single destination: the first stop
    pub waze: String,
}

/// Links for driving from `origin` through `stops` in order.
/// None when there is nowhere to go.
pub fn build_links(origin: Coordinates, stops: &[Coordinates]) -> Option<NavigationLinks> {
    let first = stops.first()?;
    Some(NavigationLinks {
        google_maps: google_maps_url(origin, stops),
        apple_maps: apple_maps_url(origin, stops),
        waze: waze_url(*first),
    })
}

/// `https://www.google.com/maps/dir/?api=1&origin=..&destination=..&waypoints=a|b&travelmode=driving`
/// The last stop is the destination, the ones before it are waypoints.
pub fn google_maps_url(origin: Coordinates, stops: &[Coordinates]) -> String {
    let Some((destination, between)) = stops.split_last() else {
        return format!(
            "https://www.google.com/maps/dir/?api=1&origin={}&travelmode=driving",
            origin.to_query_value()
        );
    };

    let mut url = format!(
        "https://www.google.com/maps/dir/?api=1&origin={}&destination={}",
        origin.to_query_value(),
        destination.to_query_value()
    );

    if !between.is_empty() {
        if between.len() > GOOGLE_MAPS_MAX_WAYPOINTS {
            warn!(
                "Google Maps link supports {} waypoints, dropping {}",
                GOOGLE_MAPS_MAX_WAYPOINTS,
                between.len() - GOOGLE_MAPS_MAX_WAYPOINTS
            );
        }
        let waypoints: Vec<String> = between
            .iter()
            .take(GOOGLE_MAPS_MAX_WAYPOINTS)
            .map(Coordinates::to_query_value)
            .collect();
        url.push_str("&waypoints=");
        url.push_str(&urlencoding::encode(&waypoints.join("|")));
    }

    url.push_str("&travelmode=driving");
    url
}

/// `https://maps.apple.com/?saddr=..&daddr=a+to:b&dirflg=d`
pub fn apple_maps_url(origin: Coordinates, stops: &[Coordinates]) -> String {
    let daddr: Vec<String> = stops.iter().map(Coordinates::to_query_value).collect();
    format!(
        "https://maps.apple.com/?saddr={}&daddr={}&dirflg=d",
        origin.to_query_value(),
        daddr.join("+to:")
    )
}

pub fn waze_url(destination: Coordinates) -> String {
    format!(
        "https://waze.com/ul?ll={}&navigate=yes",
        urlencoding::encode(&destination.to_query_value())
    )
}
