use std::fmt;

use super::input::{FixPurpose, RequestId};
use crate::geo::Coordinate;
use crate::place::PointOfInterest;
use crate::position::SmoothedPosition;
use crate::route::{RouteSummary, TravelMode};
use crate::state_machine::camera::{FollowMode, Recenter};
use crate::state_machine::guidance::GuidanceState;
use crate::state_machine::proximity::{AccessCode, AlertState};
use crate::store::LastKnownPosition;

/// User-visible status line. Never fatal, stale data stays on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMessage {
    LowAccuracy,
    PermissionDenied,
    LocationUnavailable,
    RoutingFailed,
    RecenterFailed,
    PlacesUnavailable,
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StatusMessage::LowAccuracy => "Low accuracy, awaiting better signal…",
            StatusMessage::PermissionDenied => "We need permission to access your location.",
            StatusMessage::LocationUnavailable => "We could not get your location. Try again.",
            StatusMessage::RoutingFailed => "We could not compute the route. Try another mode.",
            StatusMessage::RecenterFailed => "We could not recenter your location.",
            StatusMessage::PlacesUnavailable => "We could not load nearby places.",
        };
        f.write_str(text)
    }
}

/// State changes observers render.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    PositionChanged(SmoothedPosition),
    GuidanceChanged(Option<GuidanceState>),
    AlertChanged(Option<AlertState>),
    AccessCodeShown(AccessCode),
    AccessCodeHidden,
    Recenter(Recenter),
    FollowModeChanged(FollowMode),
    RouteChanged(Option<RouteSummary>),
    PlacesChanged(Vec<PointOfInterest>),
    SelectionChanged(Option<PointOfInterest>),
    StatusChanged(Option<StatusMessage>),
}

/// I/O the runner performs on behalf of the machine. Results come back as input.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PersistPosition(LastKnownPosition),
    FetchRoute {
        request: RequestId,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    },
    FetchPlaces {
        request: RequestId,
        center: Coordinate,
        radius_km: f64,
    },
    RequestFix(FixPurpose),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationOutput {
    Event(NavigationEvent),
    Effect(Effect),
}
