use crate::geo::{Coordinate, planar_distance_meters};
use crate::route::{Route, RouteLeg, RouteStep, strip_markup};

const FALLBACK_INSTRUCTION: &str = "Follow the route";

/// Turn-by-turn banner content.
#[derive(Debug, Clone, PartialEq)]
pub struct GuidanceState {
    pub text: String,
    pub secondary: Option<String>,
    /// Distance to the end of the active step, whole meters.
    pub distance_m: Option<f64>,
    /// Leg duration from the fetched route, whole minutes. Not a live countdown.
    pub eta_min: Option<u64>,
}

/// Distance from `position` to the closest vertex of the step's path, or to its endpoints when
/// the provider sent no path.
pub fn step_distance_m(position: &Coordinate, step: &RouteStep) -> f64 {
    let distance = |point: &Coordinate| planar_distance_meters(position, point);

    if step.path.is_empty() {
        distance(&step.start).min(distance(&step.end))
    } else {
        step.path.iter().map(distance).fold(f64::INFINITY, f64::min)
    }
}

/// Index of the step closest to `position`, lowest index on ties.
pub fn select_active_step(position: &Coordinate, steps: &[RouteStep]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, step) in steps.iter().enumerate() {
        let distance = step_distance_m(position, step);
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

fn instruction_text(step: &RouteStep) -> String {
    strip_markup(&step.instruction)
}

/// Guidance for `position` along `leg`, together with the active step index.
pub fn compute_guidance(position: &Coordinate, leg: &RouteLeg) -> Option<(usize, GuidanceState)> {
    let active = select_active_step(position, &leg.steps)?;
    let current = &leg.steps[active];

    let mut text = instruction_text(current);
    if text.is_empty() {
        text = FALLBACK_INSTRUCTION.to_string();
    }

    let to_end_m = planar_distance_meters(position, &current.end).round().max(0.0);

    let next_text = leg
        .steps
        .get(active + 1)
        .map(instruction_text)
        .filter(|t| !t.is_empty());
    let secondary = match (next_text, leg.distance_text.as_deref()) {
        (Some(next), _) => Some(format!("Then: {next}")),
        (None, Some(remaining)) => Some(format!("{remaining} left")),
        (None, None) => None,
    };

    let eta_min = leg
        .duration_s
        .is_finite()
        .then(|| (leg.duration_s / 60.0).round().max(0.0) as u64);

    Some((
        active,
        GuidanceState {
            text: format!("In {to_end_m} m: {text}"),
            secondary,
            distance_m: Some(to_end_m),
            eta_min,
        },
    ))
}

/// Tracks progress along the active route. Guidance exists exactly while a route is active.
#[derive(Debug, Default)]
pub struct GuidanceTracker {
    route: Option<Route>,
    active_step: Option<usize>,
    guidance: Option<GuidanceState>,
}

impl GuidanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn guidance(&self) -> Option<&GuidanceState> {
        self.guidance.as_ref()
    }

    pub fn active_step(&self) -> Option<usize> {
        self.active_step
    }

    pub fn is_active(&self) -> bool {
        self.route.is_some()
    }

    /// Replace the route wholesale and compute guidance for `position`.
    pub fn activate(&mut self, route: Route, position: &Coordinate) -> Option<&GuidanceState> {
        self.route = Some(route);
        self.update(position)
    }

    /// Returns `true` when a route was active.
    pub fn clear(&mut self) -> bool {
        self.active_step = None;
        self.guidance = None;
        self.route.take().is_some()
    }

    /// Recompute guidance for a new position. `None` when no route is active.
    pub fn update(&mut self, position: &Coordinate) -> Option<&GuidanceState> {
        let route = self.route.as_ref()?;
        let (active, guidance) = compute_guidance(position, route.active_leg())?;
        self.active_step = Some(active);
        self.guidance = Some(guidance);
        self.guidance.as_ref()
    }

    /// End of the step after the active one (or the last step), where the camera looks ahead to.
    pub fn look_ahead_target(&self) -> Option<Coordinate> {
        let steps = &self.route.as_ref()?.active_leg().steps;
        let active = self.active_step?;
        steps
            .get((active + 1).min(steps.len().saturating_sub(1)))
            .map(|step| step.end)
    }
}
