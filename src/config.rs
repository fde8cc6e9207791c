use std::time::Duration;

use bon::Builder;

use crate::geo::Coordinate;

/// Tuning of the positioning and guidance engine.
///
/// Every threshold has the production default; tests and binaries override single fields through
/// the builder.
#[derive(Debug, Clone, Builder)]
pub struct EngineConfig {
    /// Number of raw samples kept for smoothing.
    #[builder(default = 5)]
    pub smoothing_window: usize,

    /// Accuracy assumed for samples that do not report one.
    #[builder(default = 50.0)]
    pub default_accuracy_m: f64,

    #[builder(default = 5.0)]
    pub min_accuracy_m: f64,

    #[builder(default = 200.0)]
    pub max_accuracy_m: f64,

    /// Samples worse than this are rejected when they also jump further than
    /// `low_accuracy_jump_km`.
    #[builder(default = 80.0)]
    pub low_accuracy_threshold_m: f64,

    #[builder(default = 1.0)]
    pub low_accuracy_jump_km: f64,

    /// Any jump beyond this is treated as a sensor glitch.
    #[builder(default = 10.0)]
    pub max_jump_km: f64,

    /// How long a "low accuracy" status may linger without a better sample. `None` keeps it until
    /// the next accepted sample.
    pub low_accuracy_status_ttl: Option<Duration>,

    /// Accuracy above which a one-shot high accuracy fix is requested.
    #[builder(default = 100.0)]
    pub recalibration_accuracy_m: f64,

    #[builder(default = Duration::from_secs(15))]
    pub recalibration_interval: Duration,

    #[builder(default = 60.0)]
    pub nearby_threshold_m: f64,

    #[builder(default = 10.0)]
    pub nearby_hysteresis_m: f64,

    #[builder(default = Duration::from_secs(2 * 60))]
    pub nearby_cooldown: Duration,

    #[builder(default = 25.0)]
    pub arrival_threshold_m: f64,

    #[builder(default = 10.0)]
    pub arrival_hysteresis_m: f64,

    #[builder(default = Duration::from_secs(5 * 60))]
    pub arrival_cooldown: Duration,

    /// Recentering stays suppressed this long after a manual map gesture.
    #[builder(default = Duration::from_secs(5))]
    pub follow_suppression: Duration,

    /// Fraction of the way toward the upcoming step end the camera is biased.
    #[builder(default = 0.4)]
    pub look_ahead_fraction: f64,

    /// Recenters shorter than this are skipped.
    #[builder(default = 30.0)]
    pub min_recenter_m: f64,

    #[builder(default = 16.0)]
    pub follow_zoom: f64,

    #[builder(default = 15.0)]
    pub compact_follow_zoom: f64,

    /// Small screens follow with `compact_follow_zoom`.
    #[builder(default = false)]
    pub compact_view: bool,

    /// Places are searched around this point until the first fix arrives.
    #[builder(default = Coordinate::from_degrees_unchecked(20.6597, -103.3496))]
    pub default_center: Coordinate,

    #[builder(default = 800.0)]
    pub search_radius_m: f64,

    /// Moving this far from the last search center triggers a new places search.
    #[builder(default = 200.0)]
    pub places_refresh_distance_m: f64,
}

impl EngineConfig {
    pub fn target_zoom(&self) -> f64 {
        if self.compact_view {
            self.compact_follow_zoom
        } else {
            self.follow_zoom
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.smoothing_window, 5);
        assert_eq!(config.nearby_cooldown, Duration::from_secs(120));
        assert_eq!(config.arrival_cooldown, Duration::from_secs(300));
        assert!(config.low_accuracy_status_ttl.is_none());
        assert_eq!(config.target_zoom(), 16.0);
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::builder()
            .compact_view(true)
            .low_accuracy_status_ttl(Duration::from_secs(30))
            .build();
        assert_eq!(config.target_zoom(), 15.0);
        assert_eq!(config.low_accuracy_status_ttl, Some(Duration::from_secs(30)));
    }
}
