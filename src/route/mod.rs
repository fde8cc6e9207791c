//! Routes fetched from a directions provider. Immutable once built and replaced wholesale.

pub mod error;
pub mod markup;

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

pub use self::error::RoutingFailure;
pub use self::markup::strip_markup;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TravelMode {
    #[default]
    Walking,
    Driving,
}

impl Display for TravelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TravelMode::Walking => f.write_str("WALKING"),
            TravelMode::Driving => f.write_str("DRIVING"),
        }
    }
}

/// Indicates that a travel mode string is neither `WALKING` nor `DRIVING`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown travel mode '{0}'")]
pub struct UnknownTravelMode(pub String);

impl FromStr for TravelMode {
    type Err = UnknownTravelMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WALKING" => Ok(TravelMode::Walking),
            "DRIVING" => Ok(TravelMode::Driving),
            _ => Err(UnknownTravelMode(s.to_string())),
        }
    }
}

/// A single maneuver of a leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub start: Coordinate,
    pub end: Coordinate,
    /// Detailed polyline of the step, possibly empty.
    #[serde(default)]
    pub path: Vec<Coordinate>,
    /// Instruction as delivered by the provider, may contain markup.
    pub instruction: String,
    pub distance_m: f64,
    pub duration_s: f64,
}

impl RouteStep {
    pub fn new(start: Coordinate, end: Coordinate, instruction: impl Into<String>) -> Self {
        Self {
            start,
            end,
            path: Vec::new(),
            instruction: instruction.into(),
            distance_m: crate::geo::planar_distance_meters(&start, &end),
            duration_s: 0.0,
        }
    }

    pub fn with_path(mut self, path: Vec<Coordinate>) -> Self {
        self.path = path;
        self
    }

    pub fn with_duration_s(mut self, duration_s: f64) -> Self {
        self.duration_s = duration_s;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteLeg {
    pub steps: Vec<RouteStep>,
    pub distance_m: f64,
    /// Human readable remaining distance (e.g. `1.2 km`), when the provider supplies one.
    #[serde(default)]
    pub distance_text: Option<String>,
    pub duration_s: f64,
    #[serde(default)]
    pub duration_text: Option<String>,
    #[serde(default)]
    pub end_address: Option<String>,
}

impl RouteLeg {
    /// Leg whose totals are the sums over its steps.
    pub fn from_steps(steps: Vec<RouteStep>) -> Self {
        let distance_m = steps.iter().map(|s| s.distance_m).sum();
        let duration_s = steps.iter().map(|s| s.duration_s).sum();
        Self {
            steps,
            distance_m,
            duration_s,
            ..Self::default()
        }
    }
}

/// Axis-aligned box in degree space covering a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_west: Coordinate,
    pub north_east: Coordinate,
}

/// Display summary of a freshly activated route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    pub distance_m: f64,
    pub distance_text: Option<String>,
    pub duration_s: f64,
    pub duration_text: Option<String>,
    pub end_address: Option<String>,
    pub bounds: Bounds,
}

/// An ordered sequence of legs. Guidance follows the first leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    legs: Vec<RouteLeg>,
}

impl Route {
    /// Build a route, failing when there is no first leg with at least one step.
    pub fn new(legs: Vec<RouteLeg>) -> Result<Self, RoutingFailure> {
        match legs.first() {
            Some(leg) if !leg.steps.is_empty() => Ok(Self { legs }),
            _ => Err(RoutingFailure::NoUsableRoute),
        }
    }

    pub fn legs(&self) -> &[RouteLeg] {
        &self.legs
    }

    /// The leg guidance is computed against. Always has at least one step.
    pub fn active_leg(&self) -> &RouteLeg {
        &self.legs[0]
    }

    pub fn distance_m(&self) -> f64 {
        self.legs.iter().map(|leg| leg.distance_m).sum()
    }

    pub fn duration_s(&self) -> f64 {
        self.legs.iter().map(|leg| leg.duration_s).sum()
    }

    pub fn destination_address(&self) -> Option<&str> {
        self.legs.last().and_then(|leg| leg.end_address.as_deref())
    }

    pub fn bounds(&self) -> Bounds {
        let first = self.active_leg().steps[0].start;
        let (mut south, mut west) = (first.latitude(), first.longitude());
        let (mut north, mut east) = (south, west);

        let points = self.legs.iter().flat_map(|leg| leg.steps.iter()).flat_map(|step| {
            [step.start, step.end]
                .into_iter()
                .chain(step.path.iter().copied())
        });
        for point in points {
            south = south.min(point.latitude());
            north = north.max(point.latitude());
            west = west.min(point.longitude());
            east = east.max(point.longitude());
        }

        Bounds {
            south_west: Coordinate::from_degrees_unchecked(south, west),
            north_east: Coordinate::from_degrees_unchecked(north, east),
        }
    }

    pub fn summary(&self) -> RouteSummary {
        let leg = self.active_leg();
        RouteSummary {
            distance_m: self.distance_m(),
            distance_text: leg.distance_text.clone(),
            duration_s: self.duration_s(),
            duration_text: leg.duration_text.clone(),
            end_address: self.destination_address().map(str::to_owned),
            bounds: self.bounds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_empty_route_is_unusable() {
        assert_eq!(Route::new(Vec::new()), Err(RoutingFailure::NoUsableRoute));
        assert_eq!(
            Route::new(vec![RouteLeg::default()]),
            Err(RoutingFailure::NoUsableRoute)
        );
    }

    #[test]
    fn test_bounds_cover_all_points() {
        let step_a = RouteStep::new(coord(0.0, 0.0), coord(0.0, 1.0), "A")
            .with_path(vec![coord(-0.5, 0.5)]);
        let step_b = RouteStep::new(coord(0.0, 1.0), coord(2.0, 1.5), "B");
        let route = Route::new(vec![RouteLeg::from_steps(vec![step_a, step_b])]).unwrap();

        let bounds = route.bounds();
        assert_eq!(bounds.south_west, coord(-0.5, 0.0));
        assert_eq!(bounds.north_east, coord(2.0, 1.5));
    }

    #[test]
    fn test_leg_totals_sum_steps() {
        let leg = RouteLeg::from_steps(vec![
            RouteStep::new(coord(0.0, 0.0), coord(0.0, 0.001), "A").with_duration_s(60.0),
            RouteStep::new(coord(0.0, 0.001), coord(0.0, 0.002), "B").with_duration_s(30.0),
        ]);
        assert_eq!(leg.duration_s, 90.0);
        assert!((leg.distance_m - 222.39).abs() < 0.1);
    }

    #[test]
    fn test_travel_mode_parse() {
        assert_eq!("walking".parse::<TravelMode>(), Ok(TravelMode::Walking));
        assert_eq!("DRIVING".parse::<TravelMode>(), Ok(TravelMode::Driving));
        assert!("BICYCLING".parse::<TravelMode>().is_err());
        assert_eq!(TravelMode::Driving.to_string(), "DRIVING");
    }
}
