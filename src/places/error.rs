//! Error types for places retrieval.

use crate::geo::error::InvalidCoordinate;

/// Indicates that the nearby places could not be listed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlacesError {
    #[error("places request failed: {0}")]
    Request(String),

    #[error("places request timed out")]
    Timeout,

    #[error("malformed places payload: {0}")]
    Decode(String),

    #[error("place {id} has an invalid location")]
    InvalidLocation {
        id: String,
        #[source]
        source: InvalidCoordinate,
    },
}
