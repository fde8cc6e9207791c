use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::time::Timestamp;

/// A raw fix as delivered by a geolocation source. Never mutated after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    /// Degrees clockwise from north, `0..360`.
    #[serde(default)]
    pub heading_deg: Option<f64>,
    #[serde(default)]
    pub speed_mps: Option<f64>,
    /// Radius of the 68% confidence circle in meters.
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    pub captured_at: Timestamp,
}

impl PositionSample {
    pub fn new(coordinate: Coordinate, captured_at: Timestamp) -> Self {
        Self {
            coordinate,
            heading_deg: None,
            speed_mps: None,
            accuracy_m: None,
            captured_at,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    pub fn with_motion(mut self, heading_deg: Option<f64>, speed_mps: Option<f64>) -> Self {
        self.heading_deg = heading_deg;
        self.speed_mps = speed_mps;
        self
    }
}

/// The engine's current position estimate. Each update replaces the previous one entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedPosition {
    pub coordinate: Coordinate,
    /// Accuracy reported by the newest contributing fix.
    pub accuracy_m: Option<f64>,
    pub heading_deg: Option<f64>,
    pub speed_mps: Option<f64>,
}

impl SmoothedPosition {
    /// Speed in km/h with one decimal, as shown next to the position marker.
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed_mps.map(|mps| (mps * 3.6 * 10.0).round() / 10.0)
    }
}
