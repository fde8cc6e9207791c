//! Error types for the async navigator runner.

use crate::geolocation::error::SubscriptionNotFound;

#[derive(Debug, thiserror::Error)]
pub enum NavigatorError {
    #[error("navigator has not been started")]
    NotStarted,

    #[error("navigator is already running")]
    AlreadyStarted,

    /// The runner is gone, commands can no longer be delivered.
    #[error("navigator has shut down")]
    Closed,

    #[error(transparent)]
    Subscription(#[from] SubscriptionNotFound),
}
