//! Error types for route retrieval.

/// Indicates that no route could be used for guidance.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingFailure {
    /// The provider answered, but without a leg that has at least one step.
    #[error("no usable route returned")]
    NoUsableRoute,

    /// The provider itself failed.
    #[error("directions provider failed: {reason}")]
    Provider { reason: String },

    /// The provider did not answer in time.
    #[error("directions request timed out")]
    Timeout,
}
