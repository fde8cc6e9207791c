use std::collections::VecDeque;

use tracing::debug;

use super::StateMachine;
use crate::config::EngineConfig;
use crate::geo::{Coordinate, haversine_distance_km};
use crate::position::{PositionSample, SmoothedPosition};

/// Why a raw sample was dropped before reaching the smoothing buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// Poor accuracy combined with a large jump. Surfaced to the user as a status.
    LowAccuracySample { accuracy_m: f64, jump_km: f64 },
    /// A jump no pedestrian or car makes between two fixes. Dropped silently.
    ImplausibleJump { jump_km: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BufferedSample {
    coordinate: Coordinate,
    accuracy_m: f64,
}

/// Turns a noisy stream of [`PositionSample`]s into a [`SmoothedPosition`] using an
/// inverse-variance weighted centroid of the last few accepted samples.
#[derive(Debug)]
pub struct PositionFilter {
    window: usize,
    default_accuracy_m: f64,
    min_accuracy_m: f64,
    max_accuracy_m: f64,
    low_accuracy_threshold_m: f64,
    low_accuracy_jump_km: f64,
    max_jump_km: f64,

    buffer: VecDeque<BufferedSample>,
    last_accepted: Option<Coordinate>,
    pending: Option<FilterOutput>,
}

impl PositionFilter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window: config.smoothing_window.max(1),
            default_accuracy_m: config.default_accuracy_m,
            min_accuracy_m: config.min_accuracy_m,
            max_accuracy_m: config.max_accuracy_m,
            low_accuracy_threshold_m: config.low_accuracy_threshold_m,
            low_accuracy_jump_km: config.low_accuracy_jump_km,
            max_jump_km: config.max_jump_km,
            buffer: VecDeque::with_capacity(config.smoothing_window),
            last_accepted: None,
            pending: None,
        }
    }

    /// Reference point the next sample's jump distance is measured from.
    pub fn last_accepted(&self) -> Option<Coordinate> {
        self.last_accepted
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn offer(&mut self, sample: PositionSample) {
        let jump_km = self
            .last_accepted
            .map(|last| haversine_distance_km(&last, &sample.coordinate))
            .unwrap_or(0.0);

        if let Some(accuracy_m) = sample.accuracy_m
            && accuracy_m > self.low_accuracy_threshold_m
            && jump_km > self.low_accuracy_jump_km
        {
            debug!(accuracy_m, jump_km, "Rejected low accuracy sample");
            self.pending = Some(FilterOutput::Rejected(RejectReason::LowAccuracySample {
                accuracy_m,
                jump_km,
            }));
            return;
        }

        if !jump_km.is_finite() || jump_km > self.max_jump_km {
            debug!(jump_km, "Rejected implausible jump");
            self.pending = Some(FilterOutput::Rejected(RejectReason::ImplausibleJump { jump_km }));
            return;
        }

        if self.buffer.len() == self.window {
            self.buffer.pop_front();
        }
        self.buffer.push_back(BufferedSample {
            coordinate: sample.coordinate,
            accuracy_m: sample
                .accuracy_m
                .filter(|a| a.is_finite())
                .unwrap_or(self.default_accuracy_m),
        });

        let coordinate = self.weighted_centroid().unwrap_or(sample.coordinate);
        self.last_accepted = Some(coordinate);
        self.pending = Some(FilterOutput::Accepted(SmoothedPosition {
            coordinate,
            accuracy_m: sample.accuracy_m,
            heading_deg: sample.heading_deg,
            speed_mps: sample.speed_mps,
        }));
    }

    /// Restarts smoothing at a trusted coordinate (restored or one-shot fixes). Older samples no
    /// longer pull the estimate back.
    fn anchor(&mut self, coordinate: Coordinate) {
        self.buffer.clear();
        self.last_accepted = Some(coordinate);
    }

    /// Weight is `1 / accuracy²` with accuracy clamped to the configured range. `None` when the
    /// weights degenerate.
    fn weighted_centroid(&self) -> Option<Coordinate> {
        let (mut sum_w, mut sum_lat, mut sum_lon) = (0.0, 0.0, 0.0);
        for sample in &self.buffer {
            let accuracy = sample
                .accuracy_m
                .clamp(self.min_accuracy_m, self.max_accuracy_m);
            let w = 1.0 / (accuracy * accuracy);
            sum_w += w;
            sum_lat += sample.coordinate.latitude() * w;
            sum_lon += sample.coordinate.longitude() * w;
        }

        (sum_w > 0.0 && sum_w.is_finite())
            .then(|| Coordinate::from_degrees_unchecked(sum_lat / sum_w, sum_lon / sum_w))
    }

    fn poll_verdict(&mut self) -> Option<FilterOutput> {
        self.pending.take()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterInput {
    Sample(PositionSample),
    Anchor(Coordinate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutput {
    Accepted(SmoothedPosition),
    Rejected(RejectReason),
}

impl StateMachine for PositionFilter {
    type Input = FilterInput;
    type Output = FilterOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            FilterInput::Sample(sample) => self.offer(sample),
            FilterInput::Anchor(coordinate) => self.anchor(coordinate),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.poll_verdict()
    }
}
