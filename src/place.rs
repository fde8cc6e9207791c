use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geo::Coordinate;

/// Stable identifier of a point of interest.
///
/// The backend hands out numeric ids while other sources use opaque strings; both collapse into
/// the same cheaply clonable representation.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlaceId(Arc<str>);

impl PlaceId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PlaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PlaceId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<&str> for PlaceId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<u64> for PlaceId {
    fn from(n: u64) -> Self {
        Self(n.to_string().into())
    }
}

impl Serialize for PlaceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PlaceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Number(u64),
            Text(String),
        }

        Ok(match WireId::deserialize(deserializer)? {
            WireId::Number(n) => PlaceId::from(n),
            WireId::Text(s) => PlaceId::from(s),
        })
    }
}

/// An affiliated restroom (or any other place) shown on the map. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: PlaceId,
    pub coordinate: Coordinate,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl PointOfInterest {
    /// Minimal place with only the fields the engine reasons about.
    pub fn new(id: impl Into<PlaceId>, coordinate: Coordinate, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            coordinate,
            name: name.into(),
            address: String::new(),
            phone: None,
            website: None,
            rating: None,
            review_count: 0,
            photo_url: None,
        }
    }
}
