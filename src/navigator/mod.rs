//! Async container around [`NavigationMachine`].
//!
//! The [`Navigator`] owns the machine and is the only place that touches the clock, the position
//! source, the directions and places services and the position store. Every effect the machine
//! requests is spawned onto the runtime; its completion re-enters the single runner task through
//! a channel, so the machine itself never sees concurrency.

pub mod error;

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use self::error::NavigatorError;
use crate::config::EngineConfig;
use crate::directions::DirectionsProvider;
use crate::geo::Coordinate;
use crate::geolocation::error::GeolocationError;
use crate::geolocation::{GeolocationSource, Subscription, WatchEvent, WatchOptions};
use crate::place::PlaceId;
use crate::places::PlacesRepository;
use crate::places::error::PlacesError;
use crate::route::{RoutingFailure, TravelMode};
use crate::state_machine::StateMachine;
use crate::state_machine::camera::MapGesture;
use crate::state_machine::navigation::NavigationMachine;
use crate::state_machine::navigation::input::{FixPurpose, NavigationInput};
use crate::state_machine::navigation::output::{Effect, NavigationEvent, NavigationOutput};
use crate::state_machine::wrappers::input::SystemInput;
use crate::store::{LastKnownPosition, PositionStore};

#[derive(Debug, Clone, Builder)]
pub struct NavigatorConfig {
    #[builder(default)]
    pub engine: EngineConfig,

    /// Options of the continuous watch.
    #[builder(default = WatchOptions::builder().timeout(Duration::from_secs(15)).build())]
    pub watch: WatchOptions,

    #[builder(default = Duration::from_secs(10))]
    pub initial_fix_timeout: Duration,

    #[builder(default = Duration::from_secs(15))]
    pub recenter_timeout: Duration,

    #[builder(default = Duration::from_secs(12))]
    pub recalibration_timeout: Duration,

    #[builder(default = Duration::from_secs(15))]
    pub route_timeout: Duration,

    #[builder(default = Duration::from_secs(15))]
    pub places_timeout: Duration,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl NavigatorConfig {
    fn fix_options(&self, purpose: FixPurpose) -> WatchOptions {
        let timeout = match purpose {
            FixPurpose::Initial => self.initial_fix_timeout,
            FixPurpose::Recenter => self.recenter_timeout,
            FixPurpose::Recalibration => self.recalibration_timeout,
        };
        WatchOptions::builder()
            .high_accuracy(true)
            .timeout(timeout)
            .maximum_age(Duration::ZERO)
            .build()
    }
}

/// The outside world the navigator talks to.
#[derive(Debug)]
pub struct Sources<G, D, P, S> {
    pub geolocation: Arc<G>,
    pub directions: Arc<D>,
    pub places: Arc<P>,
    pub store: Arc<S>,
}

impl<G, D, P, S> Clone for Sources<G, D, P, S> {
    fn clone(&self) -> Self {
        Self {
            geolocation: Arc::clone(&self.geolocation),
            directions: Arc::clone(&self.directions),
            places: Arc::clone(&self.places),
            store: Arc::clone(&self.store),
        }
    }
}

#[derive(Debug)]
enum Command {
    Input(NavigationInput),
    Shutdown,
}

/// User side of a running [`Navigator`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NavigatorHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl NavigatorHandle {
    fn send(&self, input: NavigationInput) -> Result<(), NavigatorError> {
        self.commands
            .send(Command::Input(input))
            .map_err(|_| NavigatorError::Closed)
    }

    pub fn select_place(&self, id: impl Into<PlaceId>) -> Result<(), NavigatorError> {
        self.send(NavigationInput::SelectPlace(id.into()))
    }

    pub fn clear_selection(&self) -> Result<(), NavigatorError> {
        self.send(NavigationInput::ClearSelection)
    }

    pub fn set_travel_mode(&self, mode: TravelMode) -> Result<(), NavigatorError> {
        self.send(NavigationInput::SetTravelMode(mode))
    }

    pub fn toggle_following(&self) -> Result<(), NavigatorError> {
        self.send(NavigationInput::ToggleFollowing)
    }

    pub fn set_following(&self, following: bool) -> Result<(), NavigatorError> {
        self.send(NavigationInput::SetFollowing(following))
    }

    pub fn map_gesture(&self, gesture: MapGesture) -> Result<(), NavigatorError> {
        self.send(NavigationInput::Gesture(gesture))
    }

    pub fn view_changed(
        &self,
        center: Coordinate,
        zoom: Option<f64>,
    ) -> Result<(), NavigatorError> {
        self.send(NavigationInput::ViewChanged { center, zoom })
    }

    pub fn set_search_radius(&self, radius_m: f64) -> Result<(), NavigatorError> {
        self.send(NavigationInput::SetSearchRadius(radius_m))
    }

    pub fn refresh_places(&self) -> Result<(), NavigatorError> {
        self.send(NavigationInput::RefreshPlaces)
    }

    pub fn recenter(&self) -> Result<(), NavigatorError> {
        self.send(NavigationInput::RecenterRequested)
    }

    pub fn dismiss_alert(&self) -> Result<(), NavigatorError> {
        self.send(NavigationInput::DismissAlert)
    }

    pub fn dismiss_access_code(&self) -> Result<(), NavigatorError> {
        self.send(NavigationInput::DismissAccessCode)
    }

    pub fn shutdown(&self) -> Result<(), NavigatorError> {
        self.commands
            .send(Command::Shutdown)
            .map_err(|_| NavigatorError::Closed)
    }
}

enum Next {
    Watch(Option<WatchEvent>),
    Completion(NavigationInput),
    Command(Option<Command>),
}

pub struct Navigator<G, D, P, S> {
    machine: NavigationMachine,
    config: NavigatorConfig,
    sources: Sources<G, D, P, S>,

    subscription: Option<Subscription>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<NavigationInput>,
    completions_rx: mpsc::UnboundedReceiver<NavigationInput>,
    events: mpsc::UnboundedSender<NavigationEvent>,
}

impl<G, D, P, S> std::fmt::Debug for Navigator<G, D, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("machine", &"<NavigationMachine>")
            .field("subscribed", &self.subscription.is_some())
            .finish()
    }
}

impl<G, D, P, S> Navigator<G, D, P, S>
where
    G: GeolocationSource + 'static,
    D: DirectionsProvider + 'static,
    P: PlacesRepository + 'static,
    S: PositionStore + 'static,
{
    /// `seed` is handed to the engine once, for the access code generator.
    pub fn new(
        config: NavigatorConfig,
        sources: Sources<G, D, P, S>,
        seed: u64,
    ) -> (Self, NavigatorHandle, mpsc::UnboundedReceiver<NavigationEvent>) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let navigator = Self {
            machine: NavigationMachine::new(config.engine.clone(), seed),
            config,
            sources,
            subscription: None,
            commands,
            completions_tx,
            completions_rx,
            events,
        };
        let handle = NavigatorHandle {
            commands: commands_tx,
        };
        (navigator, handle, events_rx)
    }

    pub fn machine(&self) -> &NavigationMachine {
        &self.machine
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    /// Restore the persisted position, subscribe to the position source and kick off the initial
    /// fix and places search.
    pub async fn start(&mut self) -> Result<(), NavigatorError> {
        if self.subscription.is_some() {
            return Err(NavigatorError::AlreadyStarted);
        }

        match self.sources.store.load() {
            Ok(Some(saved)) => {
                debug!(
                    lat = saved.latitude,
                    lon = saved.longitude,
                    "Restoring last known position"
                );
                self.feed(NavigationInput::Restore(saved)).await;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not read last known position"),
        }

        let subscription = self.sources.geolocation.subscribe(&self.config.watch);
        info!(handle = %subscription.handle(), "Navigator started");
        self.subscription = Some(subscription);

        self.feed(NavigationInput::Started).await;
        Ok(())
    }

    /// Wait for and process exactly one position, completion or command. Returns `false` once the
    /// position stream ended or shutdown was requested.
    pub async fn step(&mut self) -> Result<bool, NavigatorError> {
        let Some(subscription) = self.subscription.as_mut() else {
            return Err(NavigatorError::NotStarted);
        };

        let next = tokio::select! {
            event = subscription.next() => Next::Watch(event),
            Some(input) = self.completions_rx.recv() => Next::Completion(input),
            command = self.commands.recv() => Next::Command(command),
        };

        match next {
            Next::Watch(Some(Ok(sample))) => self.feed(NavigationInput::Sample(sample)).await,
            Next::Watch(Some(Err(e))) => {
                debug!(error = %e, "Position watch error");
                self.feed(NavigationInput::GeolocationFailed(e)).await;
            }
            Next::Watch(None) => {
                info!("Position stream ended");
                return Ok(false);
            }
            Next::Completion(input) => self.feed(input).await,
            Next::Command(Some(Command::Input(input))) => self.feed(input).await,
            Next::Command(Some(Command::Shutdown) | None) => {
                info!("Navigator shutting down");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Step until shutdown or the end of the position stream, then unsubscribe.
    pub async fn run(&mut self) -> Result<(), NavigatorError> {
        while self.step().await? {}
        self.stop()
    }

    pub fn stop(&mut self) -> Result<(), NavigatorError> {
        let subscription = self.subscription.take().ok_or(NavigatorError::NotStarted)?;
        self.sources.geolocation.unsubscribe(subscription.handle())?;
        info!(handle = %subscription.handle(), "Navigator stopped");
        Ok(())
    }

    async fn feed(&mut self, input: NavigationInput) {
        self.machine.process_input(SystemInput::sample_system());
        self.machine.process_input(SystemInput::Input(input));

        while let Some(output) = self.machine.poll_output() {
            match output {
                NavigationOutput::Event(event) => {
                    trace!(?event, "Navigation event");
                    if self.events.send(event).is_err() {
                        trace!("Event receiver dropped");
                    }
                }
                NavigationOutput::Effect(effect) => self.dispatch(effect).await,
            }
        }
    }

    async fn dispatch(&mut self, effect: Effect) {
        match effect {
            Effect::PersistPosition(position) => self.persist(position).await,

            Effect::FetchRoute {
                request,
                origin,
                destination,
                mode,
            } => {
                debug!(%request, %mode, "Fetching route");
                let directions = Arc::clone(&self.sources.directions);
                let completions = self.completions_tx.clone();
                let limit = self.config.route_timeout;
                tokio::spawn(async move {
                    let result = timeout(limit, directions.compute_route(origin, destination, mode))
                        .await
                        .unwrap_or(Err(RoutingFailure::Timeout));
                    let _ = completions.send(NavigationInput::RouteResolved { request, result });
                });
            }

            Effect::FetchPlaces {
                request,
                center,
                radius_km,
            } => {
                debug!(%request, radius_km, "Fetching places");
                let places = Arc::clone(&self.sources.places);
                let completions = self.completions_tx.clone();
                let limit = self.config.places_timeout;
                tokio::spawn(async move {
                    let result = timeout(limit, places.list_nearby(center, radius_km))
                        .await
                        .unwrap_or(Err(PlacesError::Timeout));
                    let _ = completions.send(NavigationInput::PlacesResolved { request, result });
                });
            }

            Effect::RequestFix(purpose) => {
                debug!(?purpose, "Requesting one-shot fix");
                let geolocation = Arc::clone(&self.sources.geolocation);
                let completions = self.completions_tx.clone();
                let options = self.config.fix_options(purpose);
                tokio::spawn(async move {
                    let result = timeout(options.timeout, geolocation.current_position(&options))
                        .await
                        .unwrap_or(Err(GeolocationError::Timeout));
                    let _ = completions.send(NavigationInput::Fix { purpose, result });
                });
            }
        }
    }

    /// Writes are awaited in order so the newest position always wins.
    async fn persist(&self, position: LastKnownPosition) {
        let store = Arc::clone(&self.sources.store);
        match tokio::task::spawn_blocking(move || store.save(&position)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Could not persist last known position"),
            Err(e) => warn!(error = %e, "Persist task failed"),
        }
    }
}
