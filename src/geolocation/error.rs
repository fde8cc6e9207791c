//! Error types reported by geolocation sources.

/// Failure kinds a geolocation source reports, either on a watch or for a one-shot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("permission to access the location was denied")]
    PermissionDenied,

    #[error("timed out waiting for a location fix")]
    Timeout,

    #[error("location is currently unavailable")]
    PositionUnavailable,
}

/// Indicates that a subscription could not be cancelled because it is not registered.
#[derive(Debug, thiserror::Error)]
#[error("no active subscription {handle}")]
pub struct SubscriptionNotFound {
    pub handle: super::SubscriptionHandle,
}
