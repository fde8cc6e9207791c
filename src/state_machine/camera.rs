use std::time::Duration;

use tracing::trace;

use crate::config::EngineConfig;
use crate::geo::{Coordinate, planar_distance_meters};
use crate::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowMode {
    /// The view recenters on position updates.
    #[default]
    Following,
    /// The user owns the view.
    Manual,
}

/// Raw user interaction with the map surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapGesture {
    DragStart,
    ZoomChanged,
    PointerDown,
    RouteClicked,
}

/// Instruction for the view to pan to `target`, and zoom in to `zoom` when present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recenter {
    pub target: Coordinate,
    pub zoom: Option<f64>,
}

/// Decides when the map view follows the user and when it respects manual pan and zoom.
#[derive(Debug)]
pub struct CameraController {
    mode: FollowMode,
    last_interaction: Option<Timestamp>,
    view_center: Option<Coordinate>,
    view_zoom: Option<f64>,

    suppression: Duration,
    look_ahead_fraction: f64,
    min_recenter_m: f64,
    target_zoom: f64,
}

impl CameraController {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            mode: FollowMode::Following,
            last_interaction: None,
            view_center: None,
            view_zoom: None,
            suppression: config.follow_suppression,
            look_ahead_fraction: config.look_ahead_fraction,
            min_recenter_m: config.min_recenter_m,
            target_zoom: config.target_zoom(),
        }
    }

    pub fn mode(&self) -> FollowMode {
        self.mode
    }

    pub fn is_following(&self) -> bool {
        self.mode == FollowMode::Following
    }

    pub fn last_interaction(&self) -> Option<Timestamp> {
        self.last_interaction
    }

    pub fn gesture(&mut self, gesture: MapGesture, now: Timestamp) {
        trace!(?gesture, "Map gesture, following paused");
        self.mode = FollowMode::Manual;
        self.last_interaction = Some(now);
    }

    /// Explicit user choice. Turning following off counts as an interaction.
    /// Returns `true` when the mode changed.
    pub fn set_following(&mut self, following: bool, now: Timestamp) -> bool {
        let mode = if following {
            FollowMode::Following
        } else {
            self.last_interaction = Some(now);
            FollowMode::Manual
        };
        let changed = self.mode != mode;
        self.mode = mode;
        changed
    }

    pub fn toggle(&mut self, now: Timestamp) -> FollowMode {
        self.set_following(!self.is_following(), now);
        self.mode
    }

    /// A fresh route signals navigation intent.
    pub fn rearm(&mut self) -> bool {
        let changed = self.mode != FollowMode::Following;
        self.mode = FollowMode::Following;
        changed
    }

    /// Where the view actually is, as reported by the view itself.
    pub fn view_changed(&mut self, center: Coordinate, zoom: Option<f64>) {
        self.view_center = Some(center);
        if zoom.is_some() {
            self.view_zoom = zoom;
        }
    }

    /// Recenter decision for a new position. `look_ahead` is the upcoming step end while a route
    /// is active.
    pub fn on_position(
        &mut self,
        position: &Coordinate,
        look_ahead: Option<Coordinate>,
        now: Timestamp,
    ) -> Option<Recenter> {
        if self.mode != FollowMode::Following {
            return None;
        }
        if self
            .last_interaction
            .is_some_and(|at| now.saturating_since(at) <= self.suppression)
        {
            return None;
        }

        let target = match look_ahead {
            Some(next) => position.interpolate(&next, self.look_ahead_fraction),
            None => *position,
        };

        if self
            .view_center
            .is_some_and(|center| planar_distance_meters(&center, &target) < self.min_recenter_m)
        {
            return None;
        }

        let zoom = self
            .view_zoom
            .is_none_or(|zoom| zoom < self.target_zoom)
            .then_some(self.target_zoom);

        self.view_center = Some(target);
        if let Some(zoom) = zoom {
            self.view_zoom = Some(zoom);
        }

        Some(Recenter { target, zoom })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn north_of_origin(meters: f64) -> Coordinate {
        coord(meters / 111_194.93, 0.0)
    }

    fn at_ms(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn test_initially_following() {
        let mut camera = CameraController::new(&EngineConfig::default());
        let recenter = camera.on_position(&coord(1.0, 1.0), None, at_ms(0)).unwrap();

        assert_eq!(recenter.target, coord(1.0, 1.0));
        assert_eq!(recenter.zoom, Some(16.0));
    }

    #[test]
    fn test_gesture_switches_to_manual() {
        let mut camera = CameraController::new(&EngineConfig::default());
        camera.gesture(MapGesture::DragStart, at_ms(1_000));

        assert_eq!(camera.mode(), FollowMode::Manual);
        assert!(camera.on_position(&coord(1.0, 1.0), None, at_ms(60_000)).is_none());
    }

    #[test]
    fn test_suppression_window_after_drag() {
        let mut camera = CameraController::new(&EngineConfig::default());
        camera.view_changed(north_of_origin(0.0), Some(16.0));

        let t = 10_000;
        camera.gesture(MapGesture::DragStart, at_ms(t));
        assert!(camera.set_following(true, at_ms(t + 500)));

        let mut recenters = 0;
        for offset in [1_000, 2_500, 4_000, 4_900, 5_000] {
            if camera.on_position(&north_of_origin(40.0), None, at_ms(t + offset)).is_some() {
                recenters += 1;
            }
        }
        assert_eq!(recenters, 0);

        let recenter = camera.on_position(&north_of_origin(40.0), None, at_ms(t + 5_100));
        assert!(matches!(recenter, Some(Recenter { zoom: None, .. })));

        // Already centered there.
        assert!(camera.on_position(&north_of_origin(45.0), None, at_ms(t + 6_000)).is_none());
    }

    #[test]
    fn test_small_pans_skipped() {
        let mut camera = CameraController::new(&EngineConfig::default());
        camera.view_changed(north_of_origin(0.0), Some(17.0));

        assert!(camera.on_position(&north_of_origin(29.0), None, at_ms(0)).is_none());
        let recenter = camera.on_position(&north_of_origin(31.0), None, at_ms(1)).unwrap();
        assert_eq!(recenter.zoom, None);
    }

    #[test]
    fn test_look_ahead_bias() {
        let mut camera = CameraController::new(&EngineConfig::default());
        let recenter = camera
            .on_position(&coord(0.0, 0.0), Some(coord(0.01, 0.02)), at_ms(0))
            .unwrap();

        assert!((recenter.target.latitude() - 0.004).abs() < 1e-12);
        assert!((recenter.target.longitude() - 0.008).abs() < 1e-12);
    }

    #[test]
    fn test_toggle_and_rearm() {
        let mut camera = CameraController::new(&EngineConfig::default());

        assert_eq!(camera.toggle(at_ms(100)), FollowMode::Manual);
        assert_eq!(camera.last_interaction(), Some(at_ms(100)));
        assert_eq!(camera.toggle(at_ms(200)), FollowMode::Following);

        camera.gesture(MapGesture::ZoomChanged, at_ms(300));
        assert!(camera.rearm());
        assert!(camera.is_following());
        assert!(!camera.rearm());
    }
}
