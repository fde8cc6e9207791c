//! Directions providers. A provider answers with a [`Route`] or a [`RoutingFailure`]; the caller
//! decides what to do with stale answers.

use std::future::Future;

use bon::Builder;
use tracing::debug;

use crate::geo::{Coordinate, initial_bearing_deg, planar_distance_meters};
use crate::route::{Route, RouteLeg, RouteStep, RoutingFailure, TravelMode};

pub trait DirectionsProvider: Send + Sync {
    fn compute_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> impl Future<Output = Result<Route, RoutingFailure>> + Send;
}

/// Offline provider that walks the straight line between both ends, split into equal steps.
#[derive(Debug, Clone, Builder)]
pub struct StraightLineDirections {
    #[builder(default = 3)]
    steps: usize,

    #[builder(default = 1.4)]
    walking_speed_mps: f64,

    #[builder(default = 11.0)]
    driving_speed_mps: f64,
}

impl Default for StraightLineDirections {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl StraightLineDirections {
    fn speed_mps(&self, mode: TravelMode) -> f64 {
        match mode {
            TravelMode::Walking => self.walking_speed_mps,
            TravelMode::Driving => self.driving_speed_mps,
        }
    }

    pub fn route_between(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Result<Route, RoutingFailure> {
        let speed_mps = self.speed_mps(mode);
        if !(speed_mps.is_finite() && speed_mps > 0.0) {
            return Err(RoutingFailure::Provider {
                reason: format!("no usable speed for {mode}"),
            });
        }

        let count = self.steps.max(1);
        let heading = cardinal(initial_bearing_deg(&origin, &destination));
        let steps = (0..count)
            .map(|i| {
                let start = origin.interpolate(&destination, i as f64 / count as f64);
                let end = origin.interpolate(&destination, (i + 1) as f64 / count as f64);
                let instruction = match i {
                    0 if count > 1 => format!("Head <b>{heading}</b>"),
                    i if i + 1 == count => "Your destination is ahead".to_string(),
                    _ => format!("Continue <b>{heading}</b>"),
                };
                let step = RouteStep::new(start, end, instruction).with_path(vec![start, end]);
                let duration_s = step.distance_m / speed_mps;
                step.with_duration_s(duration_s)
            })
            .collect();

        let mut leg = RouteLeg::from_steps(steps);
        leg.distance_text = Some(format_distance(leg.distance_m));
        leg.duration_text = Some(format_duration(leg.duration_s));

        debug!(
            %mode,
            distance_m = planar_distance_meters(&origin, &destination),
            "Straight line route"
        );
        Route::new(vec![leg])
    }
}

impl DirectionsProvider for StraightLineDirections {
    fn compute_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> impl Future<Output = Result<Route, RoutingFailure>> + Send {
        let route = self.route_between(origin, destination, mode);
        async move { route }
    }
}

fn cardinal(bearing_deg: f64) -> &'static str {
    const NAMES: [&str; 8] = [
        "north",
        "northeast",
        "east",
        "southeast",
        "south",
        "southwest",
        "west",
        "northwest",
    ];
    let sector = ((bearing_deg.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
    NAMES[sector]
}

/// `350 m` below a kilometer, `1.2 km` above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", meters.round())
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

/// Whole minutes, at least one.
pub fn format_duration(seconds: f64) -> String {
    let minutes = (seconds / 60.0).round().max(1.0);
    if minutes == 1.0 {
        "1 min".to_string()
    } else {
        format!("{minutes} mins")
    }
}
