//! Error types for coordinate construction.

/// Indicates that a latitude/longitude pair falls outside the WGS84 ranges or is not finite.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid coordinate (lat {latitude}, lon {longitude})")]
pub struct InvalidCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}
