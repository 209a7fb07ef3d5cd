//! Business logic services

pub mod geo;
pub mod geocoding;
pub mod geolocation;
pub mod navigation;
pub mod nominatim;
pub mod planner;
pub mod routing;
pub mod sequencer;
pub mod stop_list;
pub mod storage;
