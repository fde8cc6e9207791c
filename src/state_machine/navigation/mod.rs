//! The live positioning and guidance engine.
//!
//! [`NavigationMachine`] composes the position filter, proximity engine, guidance tracker and
//! camera controller behind one [`StateMachine`]. It never performs I/O: everything it needs from
//! the outside world is requested as an [`Effect`] and comes back as a [`NavigationInput`].

pub mod input;
pub mod output;

use std::collections::VecDeque;

use tracing::{debug, warn};

use self::input::{FixPurpose, NavigationInput, RequestId};
use self::output::{Effect, NavigationEvent, NavigationOutput, StatusMessage};
use super::StateMachine;
use super::camera::{CameraController, FollowMode, MapGesture};
use super::guidance::{GuidanceState, GuidanceTracker};
use super::proximity::{
    AccessCode, AlertState, ArrivalTransition, NearbyTransition, ProximityEngine,
};
use super::smoothing::{FilterInput, FilterOutput, PositionFilter, RejectReason};
use super::wrappers::input::SystemInput;
use crate::config::EngineConfig;
use crate::geo::{Coordinate, planar_distance_meters};
use crate::geolocation::error::GeolocationError;
use crate::place::{PlaceId, PointOfInterest};
use crate::places::error::PlacesError;
use crate::position::{PositionSample, SmoothedPosition};
use crate::route::{Route, RoutingFailure, TravelMode};
use crate::store::LastKnownPosition;
use crate::time::Timestamp;

#[derive(Debug)]
pub struct NavigationMachine {
    config: EngineConfig,
    now: Timestamp,

    filter: PositionFilter,
    proximity: ProximityEngine,
    guidance: GuidanceTracker,
    camera: CameraController,

    position: Option<SmoothedPosition>,
    reported_accuracy_m: Option<f64>,
    last_recalibration: Option<Timestamp>,
    status: Option<(StatusMessage, Timestamp)>,

    places: Vec<PointOfInterest>,
    places_center: Option<Coordinate>,
    search_radius_m: f64,
    selected: Option<PointOfInterest>,
    travel_mode: TravelMode,

    next_request: u64,
    pending_route: Option<RequestId>,
    pending_places: Option<RequestId>,

    outputs: VecDeque<NavigationOutput>,
}

impl NavigationMachine {
    /// `seed` drives the access code generator so replays are reproducible.
    pub fn new(config: EngineConfig, seed: u64) -> Self {
        Self {
            filter: PositionFilter::new(&config),
            proximity: ProximityEngine::new(&config, seed),
            guidance: GuidanceTracker::new(),
            camera: CameraController::new(&config),
            now: Timestamp::default(),
            position: None,
            reported_accuracy_m: None,
            last_recalibration: None,
            status: None,
            places: Vec::new(),
            places_center: None,
            search_radius_m: config.search_radius_m,
            selected: None,
            travel_mode: TravelMode::default(),
            next_request: 0,
            pending_route: None,
            pending_places: None,
            outputs: VecDeque::new(),
            config,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn position(&self) -> Option<&SmoothedPosition> {
        self.position.as_ref()
    }

    pub fn guidance(&self) -> Option<&GuidanceState> {
        self.guidance.guidance()
    }

    pub fn route(&self) -> Option<&Route> {
        self.guidance.route()
    }

    pub fn alert(&self) -> Option<&AlertState> {
        self.proximity.alert()
    }

    pub fn access_code(&self) -> Option<&AccessCode> {
        self.proximity.access_code()
    }

    pub fn selected(&self) -> Option<&PointOfInterest> {
        self.selected.as_ref()
    }

    pub fn places(&self) -> &[PointOfInterest] {
        &self.places
    }

    pub fn travel_mode(&self) -> TravelMode {
        self.travel_mode
    }

    pub fn follow_mode(&self) -> FollowMode {
        self.camera.mode()
    }

    pub fn status(&self) -> Option<StatusMessage> {
        self.status.map(|(status, _)| status)
    }

    pub fn search_radius_m(&self) -> f64 {
        self.search_radius_m
    }

    fn emit(&mut self, event: NavigationEvent) {
        self.outputs.push_back(NavigationOutput::Event(event));
    }

    fn request(&mut self, effect: Effect) {
        self.outputs.push_back(NavigationOutput::Effect(effect));
    }

    fn next_request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn advance_clock(&mut self, now: Timestamp) {
        self.now = now;

        let Some(ttl) = self.config.low_accuracy_status_ttl else {
            return;
        };
        if let Some((StatusMessage::LowAccuracy, since)) = self.status
            && now.saturating_since(since) >= ttl
        {
            debug!("Low accuracy status expired");
            self.clear_status();
        }
    }

    fn set_status(&mut self, status: StatusMessage) {
        if self.status() != Some(status) {
            self.emit(NavigationEvent::StatusChanged(Some(status)));
        }
        self.status = Some((status, self.now));
    }

    fn clear_status(&mut self) {
        if self.status.take().is_some() {
            self.emit(NavigationEvent::StatusChanged(None));
        }
    }

    fn clear_status_if(&mut self, status: StatusMessage) {
        if self.status() == Some(status) {
            self.clear_status();
        }
    }

    fn start(&mut self) {
        self.request(Effect::RequestFix(FixPurpose::Initial));

        let center = self.search_center();
        self.request_places(center);
    }

    fn on_sample(&mut self, sample: PositionSample) {
        if sample.accuracy_m.is_some() {
            self.reported_accuracy_m = sample.accuracy_m;
        }

        self.filter.process_input(FilterInput::Sample(sample));
        match self.filter.poll_output() {
            Some(FilterOutput::Accepted(position)) => {
                self.clear_status();
                self.apply_position(position, true);
            }
            Some(FilterOutput::Rejected(RejectReason::LowAccuracySample { .. })) => {
                self.set_status(StatusMessage::LowAccuracy);
            }
            Some(FilterOutput::Rejected(RejectReason::ImplausibleJump { .. })) | None => {}
        }

        self.maybe_recalibrate();
    }

    fn on_fix(&mut self, purpose: FixPurpose, result: Result<PositionSample, GeolocationError>) {
        match (purpose, result) {
            (FixPurpose::Recalibration, Ok(sample)) => self.on_sample(sample),
            (FixPurpose::Initial | FixPurpose::Recenter, Ok(sample)) => self.on_direct_fix(sample),
            (FixPurpose::Recenter, Err(err)) => {
                debug!(error = %err, "Recenter fix failed");
                self.set_status(StatusMessage::RecenterFailed);
            }
            (purpose, Err(err)) => {
                debug!(?purpose, error = %err, "One-shot fix failed");
            }
        }
    }

    /// One-shot fixes bypass smoothing and become the new jump reference.
    fn on_direct_fix(&mut self, sample: PositionSample) {
        if sample.accuracy_m.is_some() {
            self.reported_accuracy_m = sample.accuracy_m;
        }
        self.filter.process_input(FilterInput::Anchor(sample.coordinate));

        self.clear_status();
        self.apply_position(
            SmoothedPosition {
                coordinate: sample.coordinate,
                accuracy_m: sample.accuracy_m,
                heading_deg: sample.heading_deg,
                speed_mps: sample.speed_mps,
            },
            true,
        );
        self.maybe_recalibrate();
    }

    fn on_restore(&mut self, saved: LastKnownPosition) {
        let coordinate = match Coordinate::new(saved.latitude, saved.longitude) {
            Ok(coordinate) => coordinate,
            Err(err) => {
                warn!(error = %err, "Ignoring persisted position");
                return;
            }
        };

        self.reported_accuracy_m = saved.accuracy;
        self.filter.process_input(FilterInput::Anchor(coordinate));
        self.apply_position(
            SmoothedPosition {
                coordinate,
                accuracy_m: saved.accuracy,
                heading_deg: None,
                speed_mps: None,
            },
            false,
        );
    }

    fn apply_position(&mut self, position: SmoothedPosition, persist: bool) {
        let coordinate = position.coordinate;
        let first_fix = self.position.is_none();

        if persist {
            self.request(Effect::PersistPosition(LastKnownPosition {
                latitude: coordinate.latitude(),
                longitude: coordinate.longitude(),
                accuracy: position.accuracy_m,
                captured_at_epoch_ms: self.now.as_millis(),
            }));
        }
        self.position = Some(position.clone());
        self.emit(NavigationEvent::PositionChanged(position));

        let previous = self.guidance.guidance().cloned();
        if let Some(guidance) = self.guidance.update(&coordinate).cloned()
            && previous.as_ref() != Some(&guidance)
        {
            self.emit(NavigationEvent::GuidanceChanged(Some(guidance)));
        }

        let look_ahead = self.guidance.look_ahead_target();
        if let Some(recenter) = self.camera.on_position(&coordinate, look_ahead, self.now) {
            self.emit(NavigationEvent::Recenter(recenter));
        }

        if first_fix && self.selected.is_some() {
            self.refresh_route();
        }

        self.evaluate_proximity();
        self.maybe_refresh_places();
    }

    fn maybe_recalibrate(&mut self) {
        let poor = self
            .reported_accuracy_m
            .is_none_or(|accuracy| accuracy > self.config.recalibration_accuracy_m);
        let due = self.last_recalibration.is_none_or(|at| {
            self.now.saturating_since(at) >= self.config.recalibration_interval
        });

        if poor && due {
            debug!(accuracy_m = ?self.reported_accuracy_m, "Requesting recalibration fix");
            self.last_recalibration = Some(self.now);
            self.request(Effect::RequestFix(FixPurpose::Recalibration));
        }
    }

    fn evaluate_proximity(&mut self) {
        let Some(coordinate) = self.position.as_ref().map(|p| p.coordinate) else {
            return;
        };

        match self
            .proximity
            .evaluate_nearby(&coordinate, &self.places, self.now)
        {
            Some(NearbyTransition::Raised(alert)) => {
                let place = alert.place.clone();
                self.emit(NavigationEvent::AlertChanged(Some(alert)));
                if self.selected.is_none() {
                    self.select(place);
                }
            }
            Some(NearbyTransition::Cleared) => self.emit(NavigationEvent::AlertChanged(None)),
            None => {}
        }

        self.evaluate_arrival();
    }

    fn evaluate_arrival(&mut self) {
        let (Some(position), Some(selected)) = (self.position.as_ref(), self.selected.as_ref())
        else {
            return;
        };

        match self
            .proximity
            .evaluate_arrival(&position.coordinate, selected, self.now)
        {
            Some(ArrivalTransition::Shown(code)) => {
                self.emit(NavigationEvent::AccessCodeShown(code))
            }
            Some(ArrivalTransition::Hidden) => self.emit(NavigationEvent::AccessCodeHidden),
            None => {}
        }
    }

    fn hide_access_code(&mut self) {
        if self.proximity.hide_access_code().is_some() {
            self.emit(NavigationEvent::AccessCodeHidden);
        }
    }

    fn select(&mut self, place: PointOfInterest) {
        if self.selected.as_ref().is_some_and(|s| s.id == place.id) {
            return;
        }
        debug!(place_id = %place.id, "Place selected");

        self.hide_access_code();
        self.selected = Some(place.clone());
        self.emit(NavigationEvent::SelectionChanged(Some(place)));
        self.refresh_route();
    }

    fn on_select(&mut self, id: PlaceId) {
        let Some(place) = self.places.iter().find(|p| p.id == id).cloned() else {
            debug!(place_id = %id, "Ignoring selection of unknown place");
            return;
        };
        self.select(place);
        self.evaluate_arrival();
    }

    fn clear_selection(&mut self) {
        if self.selected.take().is_none() {
            return;
        }
        self.hide_access_code();
        self.emit(NavigationEvent::SelectionChanged(None));
        self.refresh_route();
    }

    /// Drop the active route and, when both ends are known, request a new one. Any response to
    /// an earlier request becomes stale.
    fn refresh_route(&mut self) {
        self.pending_route = None;
        if self.guidance.clear() {
            self.emit(NavigationEvent::RouteChanged(None));
            self.emit(NavigationEvent::GuidanceChanged(None));
        }

        let (Some(position), Some(selected)) = (self.position.as_ref(), self.selected.as_ref())
        else {
            return;
        };
        let (origin, destination) = (position.coordinate, selected.coordinate);

        let request = self.next_request_id();
        self.pending_route = Some(request);
        self.request(Effect::FetchRoute {
            request,
            origin,
            destination,
            mode: self.travel_mode,
        });
    }

    fn on_route(&mut self, request: RequestId, result: Result<Route, RoutingFailure>) {
        if self.pending_route != Some(request) {
            debug!(%request, "Discarding stale route response");
            return;
        }
        self.pending_route = None;

        let Some(coordinate) = self.position.as_ref().map(|p| p.coordinate) else {
            return;
        };

        match result {
            Ok(route) => {
                let summary = route.summary();
                let guidance = self.guidance.activate(route, &coordinate).cloned();
                self.emit(NavigationEvent::RouteChanged(Some(summary)));
                self.emit(NavigationEvent::GuidanceChanged(guidance));
                self.clear_status_if(StatusMessage::RoutingFailed);

                if self.camera.rearm() {
                    self.emit(NavigationEvent::FollowModeChanged(FollowMode::Following));
                }
            }
            Err(failure) => {
                warn!(%request, error = %failure, "Routing failed");
                if self.guidance.clear() {
                    self.emit(NavigationEvent::RouteChanged(None));
                    self.emit(NavigationEvent::GuidanceChanged(None));
                }
                self.set_status(StatusMessage::RoutingFailed);
            }
        }
    }

    fn search_center(&self) -> Coordinate {
        self.position
            .as_ref()
            .map(|p| p.coordinate)
            .unwrap_or(self.config.default_center)
    }

    fn request_places(&mut self, center: Coordinate) {
        let request = self.next_request_id();
        self.pending_places = Some(request);
        self.places_center = Some(center);
        self.request(Effect::FetchPlaces {
            request,
            center,
            radius_km: self.search_radius_m / 1000.0,
        });
    }

    fn maybe_refresh_places(&mut self) {
        let center = self.search_center();
        let moved = self.places_center.is_none_or(|last| {
            planar_distance_meters(&last, &center) >= self.config.places_refresh_distance_m
        });
        if moved {
            self.request_places(center);
        }
    }

    fn on_places(&mut self, request: RequestId, result: Result<Vec<PointOfInterest>, PlacesError>) {
        if self.pending_places != Some(request) {
            debug!(%request, "Discarding stale places response");
            return;
        }
        self.pending_places = None;

        match result {
            Ok(places) => {
                self.places = places;
                self.clear_status_if(StatusMessage::PlacesUnavailable);
            }
            Err(err) => {
                warn!(error = %err, "Places unavailable");
                self.places.clear();
                self.set_status(StatusMessage::PlacesUnavailable);
            }
        }
        self.emit(NavigationEvent::PlacesChanged(self.places.clone()));

        if let Some(selected_id) = self.selected.as_ref().map(|s| s.id.clone()) {
            match self.places.iter().find(|p| p.id == selected_id).cloned() {
                Some(fresh) => self.selected = Some(fresh),
                None => self.clear_selection(),
            }
        }

        self.evaluate_proximity();
    }

    fn on_travel_mode(&mut self, mode: TravelMode) {
        if self.travel_mode != mode {
            self.travel_mode = mode;
            self.refresh_route();
        }
    }

    fn on_search_radius(&mut self, radius_m: f64) {
        if !radius_m.is_finite() || radius_m <= 0.0 || radius_m == self.search_radius_m {
            return;
        }
        self.search_radius_m = radius_m;
        let center = self.search_center();
        self.request_places(center);
    }

    fn on_gesture(&mut self, gesture: MapGesture) {
        let was_following = self.camera.is_following();
        self.camera.gesture(gesture, self.now);
        if was_following {
            self.emit(NavigationEvent::FollowModeChanged(FollowMode::Manual));
        }
    }

    fn on_set_following(&mut self, following: bool) {
        if self.camera.set_following(following, self.now) {
            self.emit(NavigationEvent::FollowModeChanged(self.camera.mode()));
        }
    }

    fn process(&mut self, input: NavigationInput) {
        match input {
            NavigationInput::Started => self.start(),
            NavigationInput::Sample(sample) => self.on_sample(sample),
            NavigationInput::Fix { purpose, result } => self.on_fix(purpose, result),
            NavigationInput::Restore(saved) => self.on_restore(saved),
            NavigationInput::GeolocationFailed(err) => self.set_status(match err {
                GeolocationError::PermissionDenied => StatusMessage::PermissionDenied,
                GeolocationError::Timeout | GeolocationError::PositionUnavailable => {
                    StatusMessage::LocationUnavailable
                }
            }),
            NavigationInput::PlacesResolved { request, result } => self.on_places(request, result),
            NavigationInput::RouteResolved { request, result } => self.on_route(request, result),
            NavigationInput::SelectPlace(id) => self.on_select(id),
            NavigationInput::ClearSelection => self.clear_selection(),
            NavigationInput::SetTravelMode(mode) => self.on_travel_mode(mode),
            NavigationInput::SetFollowing(following) => self.on_set_following(following),
            NavigationInput::ToggleFollowing => {
                let mode = self.camera.toggle(self.now);
                self.emit(NavigationEvent::FollowModeChanged(mode));
            }
            NavigationInput::Gesture(gesture) => self.on_gesture(gesture),
            NavigationInput::ViewChanged { center, zoom } => self.camera.view_changed(center, zoom),
            NavigationInput::SetSearchRadius(radius_m) => self.on_search_radius(radius_m),
            NavigationInput::RefreshPlaces => {
                let center = self.search_center();
                self.request_places(center);
            }
            NavigationInput::RecenterRequested => {
                self.request(Effect::RequestFix(FixPurpose::Recenter))
            }
            NavigationInput::DismissAlert => {
                if self.proximity.clear_alert().is_some() {
                    self.emit(NavigationEvent::AlertChanged(None));
                }
            }
            NavigationInput::DismissAccessCode => self.hide_access_code(),
        }
    }
}

impl StateMachine for NavigationMachine {
    type Input = SystemInput<NavigationInput, Timestamp>;
    type Output = NavigationOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            SystemInput::System(now) => self.advance_clock(now),
            SystemInput::Input(input) => self.process(input),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.outputs.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::route::{RouteLeg, RouteStep};

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn north_of_origin(meters: f64) -> Coordinate {
        coord(meters / 111_194.93, 0.0)
    }

    fn sample_at(coordinate: Coordinate, accuracy_m: f64) -> PositionSample {
        PositionSample::new(coordinate, Timestamp::default()).with_accuracy(accuracy_m)
    }

    struct Harness {
        machine: NavigationMachine,
        clock_ms: u64,
    }

    impl Harness {
        fn new(config: EngineConfig) -> Self {
            Self {
                machine: NavigationMachine::new(config, 42),
                clock_ms: 1_000_000,
            }
        }

        fn at(&mut self, clock_ms: u64) -> &mut Self {
            self.clock_ms = clock_ms;
            self
        }

        fn send(&mut self, input: NavigationInput) -> Vec<NavigationOutput> {
            let now = Timestamp::from_millis(self.clock_ms);
            self.machine.process_input(SystemInput::System(now));
            self.machine.process_input(SystemInput::Input(input));
            std::iter::from_fn(|| self.machine.poll_output()).collect()
        }

        fn sample(&mut self, coordinate: Coordinate, accuracy_m: f64) -> Vec<NavigationOutput> {
            self.send(NavigationInput::Sample(sample_at(coordinate, accuracy_m)))
        }

        fn select(&mut self, id: u64) -> Vec<NavigationOutput> {
            self.send(NavigationInput::SelectPlace(PlaceId::from(id)))
        }

        fn load_places(&mut self, places: Vec<PointOfInterest>) -> Vec<NavigationOutput> {
            let request = self.machine.pending_places.expect("places request outstanding");
            self.send(NavigationInput::PlacesResolved {
                request,
                result: Ok(places),
            })
        }
    }

    fn events(outputs: &[NavigationOutput]) -> Vec<&NavigationEvent> {
        outputs
            .iter()
            .filter_map(|o| match o {
                NavigationOutput::Event(event) => Some(event),
                NavigationOutput::Effect(_) => None,
            })
            .collect()
    }

    fn effects(outputs: &[NavigationOutput]) -> Vec<&Effect> {
        outputs
            .iter()
            .filter_map(|o| match o {
                NavigationOutput::Effect(effect) => Some(effect),
                NavigationOutput::Event(_) => None,
            })
            .collect()
    }

    fn route_request(outputs: &[NavigationOutput]) -> Option<(RequestId, Coordinate, TravelMode)> {
        effects(outputs).into_iter().find_map(|e| match e {
            Effect::FetchRoute {
                request,
                destination,
                mode,
                ..
            } => Some((*request, *destination, *mode)),
            _ => None,
        })
    }

    fn restroom(id: u64, coordinate: Coordinate) -> PointOfInterest {
        PointOfInterest::new(id, coordinate, format!("Restroom {id}"))
    }

    fn straight_route(from: Coordinate, to: Coordinate) -> Route {
        let mid = from.interpolate(&to, 0.5);
        let mut leg = RouteLeg::from_steps(vec![
            RouteStep::new(from, mid, "Head <b>north</b>"),
            RouteStep::new(mid, to, "Continue to destination"),
        ]);
        leg.duration_s = 300.0;
        Route::new(vec![leg]).unwrap()
    }

    #[test]
    fn test_start_requests_fix_and_places() {
        let mut h = Harness::new(EngineConfig::default());
        let out = h.send(NavigationInput::Started);

        let effects = effects(&out);
        assert!(matches!(effects[0], Effect::RequestFix(FixPurpose::Initial)));
        assert!(matches!(
            effects[1],
            Effect::FetchPlaces { center, radius_km, .. }
                if *center == EngineConfig::default().default_center && *radius_km == 0.8
        ));
    }

    #[test]
    fn test_accepted_sample_publishes_and_persists() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);

        let out = h.at(1_001_000).sample(coord(20.66, -103.35), 12.0);

        assert!(events(&out)
            .iter()
            .any(|e| matches!(e, NavigationEvent::PositionChanged(_))));
        let persisted = effects(&out).into_iter().find_map(|e| match e {
            Effect::PersistPosition(saved) => Some(saved.clone()),
            _ => None,
        });
        let persisted = persisted.expect("accepted sample is persisted");
        assert_eq!(persisted.accuracy, Some(12.0));
        assert_eq!(persisted.captured_at_epoch_ms, 1_001_000);
    }

    #[test]
    fn test_low_accuracy_jump_sets_status_without_moving() {
        let mut h = Harness::new(EngineConfig::default());
        h.sample(coord(0.0, 0.0), 10.0);
        let before = h.machine.position().cloned();

        let out = h.sample(coord(0.0135, 0.0), 200.0);
        let low_accuracy = NavigationEvent::StatusChanged(Some(StatusMessage::LowAccuracy));
        assert!(events(&out).contains(&&low_accuracy));
        assert_eq!(h.machine.position().cloned(), before);

        // A good sample clears the status.
        let out = h.sample(coord(0.0001, 0.0), 10.0);
        assert!(events(&out).contains(&&NavigationEvent::StatusChanged(None)));
    }

    #[test]
    fn test_low_accuracy_status_ttl() {
        let config = EngineConfig::builder()
            .low_accuracy_status_ttl(Duration::from_secs(30))
            .build();
        let mut h = Harness::new(config);
        h.at(0).sample(coord(0.0, 0.0), 10.0);
        h.at(1_000).sample(coord(0.0135, 0.0), 200.0);
        assert_eq!(h.machine.status(), Some(StatusMessage::LowAccuracy));

        let out = h.at(31_000).send(NavigationInput::ViewChanged {
            center: coord(0.0, 0.0),
            zoom: None,
        });
        assert_eq!(events(&out), vec![&NavigationEvent::StatusChanged(None)]);
    }

    #[test]
    fn test_implausible_jump_is_silent() {
        let mut h = Harness::new(EngineConfig::default());
        h.sample(coord(0.0, 0.0), 10.0);

        let out = h.sample(coord(0.2, 0.0), 5.0);
        assert!(events(&out).is_empty());
        assert!(h.machine.status().is_none());
    }

    #[test]
    fn test_recalibration_throttled() {
        let mut h = Harness::new(EngineConfig::default());
        let count = |out: &[NavigationOutput]| {
            effects(out)
                .iter()
                .filter(|e| matches!(e, Effect::RequestFix(FixPurpose::Recalibration)))
                .count()
        };

        assert_eq!(count(&h.at(0).sample(coord(0.0, 0.0), 150.0)), 1);
        assert_eq!(count(&h.at(10_000).sample(coord(0.0, 0.0), 150.0)), 0);
        assert_eq!(count(&h.at(15_000).sample(coord(0.0, 0.0), 150.0)), 1);
        // Good accuracy never recalibrates.
        assert_eq!(count(&h.at(60_000).sample(coord(0.0, 0.0), 20.0)), 0);
    }

    #[test]
    fn test_unknown_accuracy_recalibrates_right_after_start() {
        let mut h = Harness::new(EngineConfig::default());
        h.at(0).send(NavigationInput::Started);

        let fix = PositionSample::new(coord(0.0, 0.0), Timestamp::default());
        let out = h.at(500).send(NavigationInput::Sample(fix));
        assert!(effects(&out)
            .iter()
            .any(|e| matches!(e, Effect::RequestFix(FixPurpose::Recalibration))));
    }

    #[test]
    fn test_recalibration_fix_is_filtered_and_smoothed() {
        let mut h = Harness::new(EngineConfig::default());
        h.sample(coord(0.0, 0.0), 10.0);

        // Too far away: dropped like any watch sample.
        let out = h.send(NavigationInput::Fix {
            purpose: FixPurpose::Recalibration,
            result: Ok(sample_at(coord(0.2, 0.0), 5.0)),
        });
        assert!(events(&out).is_empty());
        assert_eq!(h.machine.position().map(|p| p.coordinate), Some(coord(0.0, 0.0)));

        // Poor accuracy with a large jump: status, no movement.
        h.send(NavigationInput::Fix {
            purpose: FixPurpose::Recalibration,
            result: Ok(sample_at(coord(0.0135, 0.0), 200.0)),
        });
        assert_eq!(h.machine.status(), Some(StatusMessage::LowAccuracy));
        assert_eq!(h.machine.position().map(|p| p.coordinate), Some(coord(0.0, 0.0)));

        // Accepted fixes blend with the buffer instead of replacing the position.
        let fix = north_of_origin(100.0);
        let out = h.send(NavigationInput::Fix {
            purpose: FixPurpose::Recalibration,
            result: Ok(sample_at(fix, 5.0)),
        });
        let latitude = h.machine.position().unwrap().coordinate.latitude();
        assert!((latitude - 0.8 * fix.latitude()).abs() < 1e-12, "got {latitude}");
        assert!(h.machine.status().is_none());
        assert!(effects(&out)
            .iter()
            .any(|e| matches!(e, Effect::PersistPosition(_))));
    }

    #[test]
    fn test_route_requested_on_selection_and_guidance_follows() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);
        let destination = north_of_origin(1_000.0);
        h.load_places(vec![restroom(1, destination)]);
        h.sample(coord(0.0, 0.0), 10.0);

        let out = h.send(NavigationInput::SelectPlace(PlaceId::from(1u64)));
        let (request, to, mode) = route_request(&out).expect("route requested");
        assert_eq!(to, destination);
        assert_eq!(mode, TravelMode::Walking);
        assert!(h.machine.guidance().is_none());

        let out = h.send(NavigationInput::RouteResolved {
            request,
            result: Ok(straight_route(coord(0.0, 0.0), destination)),
        });
        let guidance = events(&out).into_iter().find_map(|e| match e {
            NavigationEvent::GuidanceChanged(g) => g.clone(),
            _ => None,
        });
        let guidance = guidance.expect("guidance after route");
        assert_eq!(guidance.text, "In 500 m: Head north");
        assert_eq!(guidance.eta_min, Some(5));
        assert!(h.machine.guidance().is_some());
    }

    #[test]
    fn test_stale_route_discarded() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);
        let destination = north_of_origin(1_000.0);
        h.load_places(vec![restroom(1, destination)]);
        h.sample(coord(0.0, 0.0), 10.0);

        let (first, ..) = route_request(&h.select(1)).unwrap();
        let (second, _, mode) =
            route_request(&h.send(NavigationInput::SetTravelMode(TravelMode::Driving))).unwrap();
        assert_ne!(first, second);
        assert_eq!(mode, TravelMode::Driving);

        let out = h.send(NavigationInput::RouteResolved {
            request: first,
            result: Ok(straight_route(coord(0.0, 0.0), destination)),
        });
        assert!(out.is_empty());
        assert!(h.machine.route().is_none());

        h.send(NavigationInput::RouteResolved {
            request: second,
            result: Ok(straight_route(coord(0.0, 0.0), destination)),
        });
        assert!(h.machine.route().is_some());
    }

    #[test]
    fn test_routing_failure_clears_guidance() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);
        let destination = north_of_origin(1_000.0);
        h.load_places(vec![restroom(1, destination)]);
        h.sample(coord(0.0, 0.0), 10.0);

        let (request, ..) = route_request(&h.select(1)).unwrap();
        h.send(NavigationInput::RouteResolved {
            request,
            result: Ok(straight_route(coord(0.0, 0.0), destination)),
        });

        let (request, ..) =
            route_request(&h.send(NavigationInput::SetTravelMode(TravelMode::Driving))).unwrap();
        let out = h.send(NavigationInput::RouteResolved {
            request,
            result: Err(RoutingFailure::NoUsableRoute),
        });

        assert!(h.machine.guidance().is_none());
        assert!(h.machine.route().is_none());
        assert!(events(&out).contains(&&NavigationEvent::StatusChanged(Some(
            StatusMessage::RoutingFailed
        ))));
        // No automatic retry.
        assert!(route_request(&out).is_none());
    }

    #[test]
    fn test_first_fix_triggers_route_for_existing_selection() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);
        h.load_places(vec![restroom(1, north_of_origin(1_000.0))]);

        let out = h.send(NavigationInput::SelectPlace(PlaceId::from(1u64)));
        assert!(route_request(&out).is_none());

        let out = h.sample(coord(0.0, 0.0), 10.0);
        assert!(route_request(&out).is_some());

        // Later samples do not refetch.
        let out = h.sample(north_of_origin(5.0), 10.0);
        assert!(route_request(&out).is_none());
    }

    #[test]
    fn test_nearby_alert_auto_selects() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);
        h.sample(coord(0.0, 0.0), 10.0);
        let places_request = h.machine.pending_places;
        assert!(places_request.is_some());
        h.load_places(vec![
            restroom(3, north_of_origin(200.0)),
            restroom(4, north_of_origin(50.0)),
        ]);

        assert_eq!(h.machine.alert().map(|a| a.place.id.clone()), Some(PlaceId::from(4u64)));
        assert_eq!(h.machine.selected().map(|p| p.id.clone()), Some(PlaceId::from(4u64)));
    }

    #[test]
    fn test_arrival_shows_access_code() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);
        let door = north_of_origin(200.0);
        h.load_places(vec![restroom(9, door)]);
        h.sample(coord(0.0, 0.0), 10.0);
        h.send(NavigationInput::SelectPlace(PlaceId::from(9u64)));

        let mut shown = 0;
        for meters in [100.0, 150.0, 190.0, 200.0, 200.0, 200.0, 200.0, 200.0] {
            let out = h.sample(north_of_origin(meters), 5.0);
            shown += events(&out)
                .iter()
                .filter(|e| matches!(e, NavigationEvent::AccessCodeShown(_)))
                .count();
        }
        assert_eq!(shown, 1);
        assert!(h.machine.access_code().is_some());

        let out = h.send(NavigationInput::DismissAccessCode);
        assert_eq!(events(&out), vec![&NavigationEvent::AccessCodeHidden]);
    }

    #[test]
    fn test_places_refresh_drops_missing_selection() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);
        h.load_places(vec![restroom(1, north_of_origin(1_000.0))]);
        h.send(NavigationInput::SelectPlace(PlaceId::from(1u64)));

        h.send(NavigationInput::SetSearchRadius(300.0));
        let out = h.load_places(vec![restroom(2, north_of_origin(2_000.0))]);

        assert!(h.machine.selected().is_none());
        assert!(events(&out).contains(&&NavigationEvent::SelectionChanged(None)));
    }

    #[test]
    fn test_stale_places_discarded() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);
        let first = h.machine.pending_places.unwrap();

        let out = h.send(NavigationInput::RefreshPlaces);
        assert!(matches!(effects(&out).as_slice(), [Effect::FetchPlaces { .. }]));

        let out = h.send(NavigationInput::PlacesResolved {
            request: first,
            result: Ok(vec![restroom(1, north_of_origin(10.0))]),
        });
        assert!(out.is_empty());
        assert!(h.machine.places().is_empty());
    }

    #[test]
    fn test_places_failure_empties_list() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);
        let request = h.machine.pending_places.unwrap();

        let out = h.send(NavigationInput::PlacesResolved {
            request,
            result: Err(PlacesError::Request("offline".to_string())),
        });

        assert!(h.machine.places().is_empty());
        assert!(events(&out).contains(&&NavigationEvent::PlacesChanged(Vec::new())));
        assert_eq!(h.machine.status(), Some(StatusMessage::PlacesUnavailable));
    }

    #[test]
    fn test_places_refetched_after_moving() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);
        let fetches = |out: &[NavigationOutput]| {
            effects(out)
                .iter()
                .filter(|e| matches!(e, Effect::FetchPlaces { .. }))
                .count()
        };

        // First fix is far from the default center.
        assert_eq!(fetches(&h.sample(coord(0.0, 0.0), 10.0)), 1);
        assert_eq!(fetches(&h.sample(north_of_origin(100.0), 10.0)), 0);
        // Smoothing lags behind the raw samples, keep walking.
        let mut total = 0;
        for step in 2..=8 {
            total += fetches(&h.sample(north_of_origin(step as f64 * 100.0), 10.0));
        }
        assert!(total >= 1);
    }

    #[test]
    fn test_geolocation_errors_keep_state() {
        let mut h = Harness::new(EngineConfig::default());
        h.sample(coord(0.0, 0.0), 10.0);
        let before = h.machine.position().cloned();

        let out = h.send(NavigationInput::GeolocationFailed(GeolocationError::PermissionDenied));
        assert_eq!(
            events(&out),
            vec![&NavigationEvent::StatusChanged(Some(StatusMessage::PermissionDenied))]
        );
        assert_eq!(h.machine.position().cloned(), before);

        h.send(NavigationInput::GeolocationFailed(GeolocationError::Timeout));
        assert_eq!(h.machine.status(), Some(StatusMessage::LocationUnavailable));
    }

    #[test]
    fn test_restore_sets_position_without_persisting() {
        let mut h = Harness::new(EngineConfig::default());
        let out = h.send(NavigationInput::Restore(LastKnownPosition {
            latitude: 20.6597,
            longitude: -103.3496,
            accuracy: Some(18.0),
            captured_at_epoch_ms: 5,
        }));

        assert!(effects(&out)
            .iter()
            .all(|e| !matches!(e, Effect::PersistPosition(_))));
        assert_eq!(h.machine.position().map(|p| p.coordinate), Some(coord(20.6597, -103.3496)));

        // The restored point is the jump reference.
        let out = h.sample(coord(21.0, -103.3496), 10.0);
        assert!(events(&out).is_empty());
    }

    #[test]
    fn test_gesture_then_route_rearms_following() {
        let mut h = Harness::new(EngineConfig::default());
        h.send(NavigationInput::Started);
        let destination = north_of_origin(1_000.0);
        h.load_places(vec![restroom(1, destination)]);
        h.sample(coord(0.0, 0.0), 10.0);

        let out = h.send(NavigationInput::Gesture(MapGesture::DragStart));
        assert_eq!(events(&out), vec![&NavigationEvent::FollowModeChanged(FollowMode::Manual)]);

        let (request, ..) = route_request(&h.select(1)).unwrap();
        let out = h.send(NavigationInput::RouteResolved {
            request,
            result: Ok(straight_route(coord(0.0, 0.0), destination)),
        });
        assert!(events(&out).contains(&&NavigationEvent::FollowModeChanged(FollowMode::Following)));
        assert_eq!(h.machine.follow_mode(), FollowMode::Following);
    }

    #[test]
    fn test_recenter_failure_surfaces_status() {
        let mut h = Harness::new(EngineConfig::default());
        let out = h.send(NavigationInput::RecenterRequested);
        assert_eq!(effects(&out), vec![&Effect::RequestFix(FixPurpose::Recenter)]);

        h.send(NavigationInput::Fix {
            purpose: FixPurpose::Recenter,
            result: Err(GeolocationError::Timeout),
        });
        assert_eq!(h.machine.status(), Some(StatusMessage::RecenterFailed));
    }
}
