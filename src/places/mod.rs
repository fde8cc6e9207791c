//! Nearby places retrieval and the wire format of the public places endpoint.

pub mod error;

use std::future::Future;

use serde::Deserialize;
use tracing::debug;

use self::error::PlacesError;
use crate::geo::{Coordinate, haversine_distance_km};
use crate::place::{PlaceId, PointOfInterest};

/// Most places a single listing returns.
pub const MAX_RESULTS: usize = 200;

pub trait PlacesRepository: Send + Sync {
    fn list_nearby(
        &self,
        center: Coordinate,
        radius_km: f64,
    ) -> impl Future<Output = Result<Vec<PointOfInterest>, PlacesError>> + Send;
}

/// Body of a places listing: `{"places": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlacesResponse {
    pub places: Vec<PlaceRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceRecord {
    pub id: PlaceId,
    pub business_name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<u32>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub business_phone: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Distance from the query center as computed by the server, when a center was given.
    #[serde(default)]
    pub distance_km: Option<f64>,
}

impl PlaceRecord {
    pub fn into_place(self) -> Result<PointOfInterest, PlacesError> {
        let coordinate =
            Coordinate::new(self.lat, self.lng).map_err(|source| PlacesError::InvalidLocation {
                id: self.id.to_string(),
                source,
            })?;

        let blank_to_none = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Ok(PointOfInterest {
            id: self.id,
            coordinate,
            name: self.business_name,
            address: self.address.unwrap_or_default(),
            phone: blank_to_none(self.business_phone),
            website: blank_to_none(self.website),
            rating: self.rating,
            review_count: self.review_count.unwrap_or(0),
            photo_url: blank_to_none(self.photo_url),
        })
    }
}

impl PlacesResponse {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PlacesError> {
        serde_json::from_slice(bytes).map_err(|e| PlacesError::Decode(e.to_string()))
    }

    /// Validated places, at most [`MAX_RESULTS`]. One bad location fails the whole listing.
    pub fn into_places(self) -> Result<Vec<PointOfInterest>, PlacesError> {
        self.places
            .into_iter()
            .take(MAX_RESULTS)
            .map(PlaceRecord::into_place)
            .collect()
    }
}

/// Places held in memory, filtered like the public endpoint: the first [`MAX_RESULTS`] entries
/// are considered and those outside the radius dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlaces {
    places: Vec<PointOfInterest>,
}

impl InMemoryPlaces {
    pub fn new(places: Vec<PointOfInterest>) -> Self {
        Self { places }
    }

    pub fn nearby(&self, center: &Coordinate, radius_km: f64) -> Vec<PointOfInterest> {
        self.places
            .iter()
            .take(MAX_RESULTS)
            .filter(|place| haversine_distance_km(center, &place.coordinate) <= radius_km)
            .cloned()
            .collect()
    }
}

impl PlacesRepository for InMemoryPlaces {
    fn list_nearby(
        &self,
        center: Coordinate,
        radius_km: f64,
    ) -> impl Future<Output = Result<Vec<PointOfInterest>, PlacesError>> + Send {
        let places = self.nearby(&center, radius_km);
        debug!(count = places.len(), radius_km, "Listed nearby places");
        async move { Ok(places) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_decode_backend_payload() {
        let body = br#"{"places":[
            {"id":7,"business_name":"Cafe Luna","address":"Av. Chapultepec 12",
             "lat":20.67,"lng":-103.37,
             "rating":4.5,"review_count":12,"website":"","business_phone":"33 1234 5678",
             "place_id":"abc","photo_url":null,"distance_km":0.412},
            {"id":"x-9","business_name":"Hotel Sol","lat":20.66,"lng":-103.35}
        ]}"#;

        let places = PlacesResponse::from_slice(body).unwrap().into_places().unwrap();

        assert_eq!(places.len(), 2);
        assert_eq!(places[0].id, PlaceId::from(7u64));
        assert_eq!(places[0].name, "Cafe Luna");
        assert_eq!(places[0].phone.as_deref(), Some("33 1234 5678"));
        assert_eq!(places[0].website, None);
        assert_eq!(places[0].review_count, 12);
        assert_eq!(places[1].id, PlaceId::from("x-9"));
        assert_eq!(places[1].address, "");
        assert_eq!(places[1].coordinate, coord(20.66, -103.35));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            PlacesResponse::from_slice(b"{\"places\": 3}"),
            Err(PlacesError::Decode(_))
        ));

        let body = br#"{"places":[{"id":1,"business_name":"Bad","lat":95.0,"lng":0.0}]}"#;
        let err = PlacesResponse::from_slice(body).unwrap().into_places().unwrap_err();
        assert!(matches!(err, PlacesError::InvalidLocation { ref id, .. } if id == "1"));
    }

    #[tokio::test]
    async fn test_in_memory_radius_filter() {
        let center = coord(0.0, 0.0);
        let repo = InMemoryPlaces::new(vec![
            PointOfInterest::new(1u64, coord(0.0, 0.005), "near"),
            PointOfInterest::new(2u64, coord(0.0, 0.02), "far"),
        ]);

        let places = repo.list_nearby(center, 0.8).await.unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].name, "near");
    }

    #[tokio::test]
    async fn test_in_memory_caps_results() {
        let center = coord(0.0, 0.0);
        let places = (0..250u64)
            .map(|i| PointOfInterest::new(i, center, format!("place {i}")))
            .collect();
        let repo = InMemoryPlaces::new(places);

        assert_eq!(repo.list_nearby(center, 1.0).await.unwrap().len(), MAX_RESULTS);
    }
}
