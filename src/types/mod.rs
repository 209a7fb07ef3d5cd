//! Type definitions

pub mod appointment;
pub mod location;
pub mod route;

pub use appointment::*;
pub use location::*;
pub use route::*;
