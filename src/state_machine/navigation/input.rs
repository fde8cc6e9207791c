use std::fmt;

use crate::geo::Coordinate;
use crate::geolocation::error::GeolocationError;
use crate::place::{PlaceId, PointOfInterest};
use crate::places::error::PlacesError;
use crate::position::PositionSample;
use crate::route::{Route, RoutingFailure, TravelMode};
use crate::state_machine::camera::MapGesture;
use crate::store::LastKnownPosition;

/// Identity of an outstanding directions or places request. Responses carrying an id other
/// than the latest issued one are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a one-shot position fix was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixPurpose {
    /// First fix after start, to speed up the first position.
    Initial,
    /// The user asked to recenter on their position.
    Recenter,
    /// Accuracy has been poor, try a fresh high accuracy reading.
    Recalibration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationInput {
    /// The engine has been started. Kicks off the initial fix and places search.
    Started,
    /// A sample from the continuous watch.
    Sample(PositionSample),
    /// Outcome of a one-shot request.
    Fix {
        purpose: FixPurpose,
        result: Result<PositionSample, GeolocationError>,
    },
    /// Last known position read back from durable storage.
    Restore(LastKnownPosition),
    /// The continuous watch reported an error.
    GeolocationFailed(GeolocationError),
    PlacesResolved {
        request: RequestId,
        result: Result<Vec<PointOfInterest>, PlacesError>,
    },
    RouteResolved {
        request: RequestId,
        result: Result<Route, RoutingFailure>,
    },
    SelectPlace(PlaceId),
    ClearSelection,
    SetTravelMode(TravelMode),
    SetFollowing(bool),
    ToggleFollowing,
    Gesture(MapGesture),
    ViewChanged {
        center: Coordinate,
        zoom: Option<f64>,
    },
    SetSearchRadius(f64),
    /// Search again around the current position (or the default center).
    RefreshPlaces,
    RecenterRequested,
    DismissAlert,
    DismissAccessCode,
}
