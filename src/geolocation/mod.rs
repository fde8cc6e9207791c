//! Position sources. A source delivers a continuous watch of samples and answers one-shot
//! requests for a fresh fix.

pub mod error;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_stream::stream;
use bon::Builder;
use dashmap::DashMap;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, trace};
use uuid::Uuid;

use self::error::{GeolocationError, SubscriptionNotFound};
use crate::geo::{Coordinate, initial_bearing_deg, planar_distance_meters};
use crate::position::PositionSample;
use crate::time::Timestamp;

/// What a watch delivers: a sample or a reported failure.
pub type WatchEvent = Result<PositionSample, GeolocationError>;

#[derive(Debug, Clone, Builder)]
pub struct WatchOptions {
    #[builder(default = true)]
    pub high_accuracy: bool,

    /// How long a one-shot request may wait for a fix.
    #[builder(default = Duration::from_secs(10))]
    pub timeout: Duration,

    /// Oldest cached fix a one-shot request accepts. Zero demands a fresh reading.
    #[builder(default = Duration::ZERO)]
    pub maximum_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Clone, Hash, PartialEq, Eq)]
pub struct SubscriptionHandle(Arc<Uuid>);

impl SubscriptionHandle {
    pub fn generate() -> Self {
        Self(Arc::new(Uuid::new_v4()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionHandle({})", self.0)
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live subscription to the continuous watch. Dropping it closes the receiving side, the source
/// forgets closed subscriptions on its next delivery.
#[derive(Debug)]
pub struct Subscription {
    handle: SubscriptionHandle,
    events: mpsc::UnboundedReceiver<WatchEvent>,
}

impl Subscription {
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    pub async fn next(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<WatchEvent> {
        UnboundedReceiverStream::new(self.events)
    }
}

pub trait GeolocationSource: Send + Sync {
    fn subscribe(&self, options: &WatchOptions) -> Subscription;

    fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), SubscriptionNotFound>;

    fn current_position(
        &self,
        options: &WatchOptions,
    ) -> impl Future<Output = Result<PositionSample, GeolocationError>> + Send;
}

/// A source fed by hand. Every pushed event fans out to all live subscriptions and becomes the
/// answer to one-shot requests.
#[derive(Debug, Default)]
pub struct SimulatedGeolocation {
    subscribers: DashMap<SubscriptionHandle, mpsc::UnboundedSender<WatchEvent>, ahash::RandomState>,
    latest: Mutex<Option<WatchEvent>>,
}

impl SimulatedGeolocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: WatchEvent) {
        trace!(?event, "Simulated geolocation event");
        *self.latest.lock().expect("latest fix lock poisoned") = Some(event.clone());
        self.subscribers
            .retain(|handle, sender| match sender.send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!(%handle, "Dropping closed subscription");
                    false
                }
            });
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscribers.len()
    }
}

impl GeolocationSource for SimulatedGeolocation {
    fn subscribe(&self, options: &WatchOptions) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle::generate();
        debug!(%handle, high_accuracy = options.high_accuracy, "Subscription registered");
        self.subscribers.insert(handle.clone(), tx);
        Subscription { handle, events: rx }
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), SubscriptionNotFound> {
        self.subscribers
            .remove(handle)
            .ok_or_else(|| SubscriptionNotFound {
                handle: handle.clone(),
            })?;
        Ok(())
    }

    fn current_position(
        &self,
        _options: &WatchOptions,
    ) -> impl Future<Output = Result<PositionSample, GeolocationError>> + Send {
        let latest = self
            .latest
            .lock()
            .expect("latest fix lock poisoned")
            .clone();
        async move { latest.unwrap_or(Err(GeolocationError::PositionUnavailable)) }
    }
}

/// A scripted walk along a polyline at constant speed.
#[derive(Debug, Clone, Builder)]
pub struct Walk {
    path: Vec<Coordinate>,

    #[builder(default = 1.4)]
    speed_mps: f64,

    /// Time between consecutive samples.
    #[builder(default = Duration::from_secs(1))]
    interval: Duration,

    #[builder(default = 10.0)]
    accuracy_m: f64,

    /// Capture time of the first sample.
    #[builder(default)]
    start: Timestamp,
}

impl Walk {
    /// Samples along the path, ending exactly on its last vertex. Capture times advance by
    /// `interval`, pacing in real time is up to the consumer.
    pub fn samples(self) -> impl Stream<Item = PositionSample> {
        stream! {
            let step_m = self.speed_mps * self.interval.as_secs_f64();
            let lengths: Vec<f64> = self
                .path
                .windows(2)
                .map(|pair| planar_distance_meters(&pair[0], &pair[1]))
                .collect();
            let total_m: f64 = lengths.iter().sum();

            let mut captured_at = self.start;
            let mut traveled_m = 0.0;
            let mut segment = 0;
            let mut segment_start_m = 0.0;

            if let Some(&last) = self.path.last() {
                loop {
                    if traveled_m >= total_m - 1e-6 || step_m <= 0.0 {
                        yield PositionSample::new(last, captured_at).with_accuracy(self.accuracy_m);
                        break;
                    }

                    while segment + 1 < lengths.len()
                        && traveled_m > segment_start_m + lengths[segment]
                    {
                        segment_start_m += lengths[segment];
                        segment += 1;
                    }

                    let (from, to) = (self.path[segment], self.path[segment + 1]);
                    let t = if lengths[segment] > 0.0 {
                        (traveled_m - segment_start_m) / lengths[segment]
                    } else {
                        1.0
                    };

                    yield PositionSample::new(from.interpolate(&to, t), captured_at)
                        .with_accuracy(self.accuracy_m)
                        .with_motion(Some(initial_bearing_deg(&from, &to)), Some(self.speed_mps));

                    traveled_m += step_m;
                    captured_at = captured_at.checked_add(self.interval).unwrap_or(captured_at);
                }
            }
        }
    }
}
