//! Live positioning and guidance engine for the Popi map.
//!
//! Raw position samples are smoothed into a stable position estimate, checked against nearby
//! places for alerts and arrival, tracked along an active route for turn-by-turn guidance, and
//! turned into camera recenter decisions. The decision logic lives in pure machines under
//! [`state_machine`]; [`navigator`] wires them to real position, directions, places and storage
//! services.

pub mod config;
pub mod directions;
pub mod geo;
pub mod geolocation;
pub mod navigator;
pub mod place;
pub mod places;
pub mod position;
pub mod route;
pub mod state_machine;
pub mod store;
pub mod time;

pub use config::EngineConfig;
pub use geo::Coordinate;
pub use navigator::{Navigator, NavigatorConfig, NavigatorHandle, Sources};
pub use place::{PlaceId, PointOfInterest};
pub use position::{PositionSample, SmoothedPosition};
pub use route::{Route, TravelMode};
pub use state_machine::StateMachine;
pub use state_machine::navigation::NavigationMachine;
pub use time::Timestamp;
