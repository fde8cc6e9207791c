use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::EngineConfig;
use crate::geo::{Coordinate, planar_distance_meters};
use crate::place::{PlaceId, PointOfInterest};
use crate::time::Timestamp;

/// "You are near a restroom" banner.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertState {
    pub place: PointOfInterest,
    /// Rounded to whole meters.
    pub distance_m: f64,
}

/// One-time code shown on arrival. Presentation only, carries no security guarantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCode {
    pub place_id: PlaceId,
    pub code: u32,
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.code)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NearbyTransition {
    Raised(AlertState),
    Cleared,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrivalTransition {
    Shown(AccessCode),
    Hidden,
}

/// Linear scan for the closest place, first one wins on ties.
pub fn nearest_place<'a>(
    position: &Coordinate,
    places: &'a [PointOfInterest],
) -> Option<(&'a PointOfInterest, f64)> {
    places.iter().fold(None, |best, place| {
        let distance = planar_distance_meters(position, &place.coordinate);
        match best {
            Some((_, best_distance)) if best_distance <= distance => best,
            _ => Some((place, distance)),
        }
    })
}

type CooldownMap = HashMap<PlaceId, Timestamp, ahash::RandomState>;

/// Rate limited proximity detection against the nearest place (nearby alert) and the selected
/// place (arrival access code).
#[derive(Debug)]
pub struct ProximityEngine {
    nearby_threshold_m: f64,
    nearby_clear_m: f64,
    nearby_cooldown: Duration,
    arrival_threshold_m: f64,
    arrival_clear_m: f64,
    arrival_cooldown: Duration,

    alert: Option<AlertState>,
    access_code: Option<AccessCode>,
    nearby_fired: CooldownMap,
    arrival_fired: CooldownMap,
    rng: StdRng,
}

impl ProximityEngine {
    pub fn new(config: &EngineConfig, seed: u64) -> Self {
        Self {
            nearby_threshold_m: config.nearby_threshold_m,
            nearby_clear_m: config.nearby_threshold_m + config.nearby_hysteresis_m,
            nearby_cooldown: config.nearby_cooldown,
            arrival_threshold_m: config.arrival_threshold_m,
            arrival_clear_m: config.arrival_threshold_m + config.arrival_hysteresis_m,
            arrival_cooldown: config.arrival_cooldown,
            alert: None,
            access_code: None,
            nearby_fired: CooldownMap::default(),
            arrival_fired: CooldownMap::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn alert(&self) -> Option<&AlertState> {
        self.alert.as_ref()
    }

    pub fn access_code(&self) -> Option<&AccessCode> {
        self.access_code.as_ref()
    }

    /// Raise, hold or clear the nearby alert for the current position.
    ///
    /// Between the trigger threshold and the clear threshold the previous state is kept.
    pub fn evaluate_nearby(
        &mut self,
        position: &Coordinate,
        places: &[PointOfInterest],
        now: Timestamp,
    ) -> Option<NearbyTransition> {
        let Some((nearest, distance_m)) = nearest_place(position, places) else {
            return self.clear_alert();
        };

        let cooling_down =
            is_cooling_down(&self.nearby_fired, &nearest.id, now, self.nearby_cooldown);

        if distance_m <= self.nearby_threshold_m && !cooling_down {
            debug!(place_id = %nearest.id, distance_m, "Nearby alert raised");
            let alert = AlertState {
                place: nearest.clone(),
                distance_m: distance_m.round(),
            };
            record(&mut self.nearby_fired, nearest.id.clone(), now, self.nearby_cooldown);
            self.alert = Some(alert.clone());
            Some(NearbyTransition::Raised(alert))
        } else if distance_m > self.nearby_clear_m {
            self.clear_alert()
        } else {
            None
        }
    }

    /// Drop the alert. Cooldowns keep running.
    pub fn clear_alert(&mut self) -> Option<NearbyTransition> {
        self.alert.take().map(|_| NearbyTransition::Cleared)
    }

    /// Show or hide the access code for the selected place.
    pub fn evaluate_arrival(
        &mut self,
        position: &Coordinate,
        selected: &PointOfInterest,
        now: Timestamp,
    ) -> Option<ArrivalTransition> {
        let distance_m = planar_distance_meters(position, &selected.coordinate);
        let cooling_down =
            is_cooling_down(&self.arrival_fired, &selected.id, now, self.arrival_cooldown);

        if distance_m <= self.arrival_threshold_m && !cooling_down {
            let code = AccessCode {
                place_id: selected.id.clone(),
                code: self.rng.random_range(100_000..=999_999),
            };
            debug!(place_id = %selected.id, distance_m, "Arrival detected");
            record(&mut self.arrival_fired, selected.id.clone(), now, self.arrival_cooldown);
            self.access_code = Some(code.clone());
            Some(ArrivalTransition::Shown(code))
        } else if distance_m > self.arrival_clear_m {
            self.hide_access_code()
        } else {
            None
        }
    }

    pub fn hide_access_code(&mut self) -> Option<ArrivalTransition> {
        self.access_code.take().map(|_| ArrivalTransition::Hidden)
    }
}

fn is_cooling_down(fired: &CooldownMap, id: &PlaceId, now: Timestamp, cooldown: Duration) -> bool {
    fired
        .get(id)
        .is_some_and(|at| now.saturating_since(*at) < cooldown)
}

fn record(fired: &mut CooldownMap, id: PlaceId, now: Timestamp, cooldown: Duration) {
    fired.retain(|_, at| now.saturating_since(*at) < cooldown);
    fired.insert(id, now);
}
