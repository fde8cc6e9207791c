//! Great-circle helpers shared by the filter, alert, guidance and camera machines.

pub mod error;

use serde::{Deserialize, Serialize};

use self::error::InvalidCoordinate;

/// Mean Earth radius used by every distance computation in the crate.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 latitude/longitude pair in degrees.
///
/// Construction through [`Coordinate::new`] guarantees latitude in `[-90, 90]` and longitude in
/// `[-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = InvalidCoordinate;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinate> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if valid {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    /// Callers must only pass values derived from valid coordinates (convex combinations).
    pub(crate) const fn from_degrees_unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Linear interpolation in degree space, `t = 0` is `self` and `t = 1` is `toward`.
    pub fn interpolate(&self, toward: &Coordinate, t: f64) -> Coordinate {
        let t = t.clamp(0.0, 1.0);
        Self::from_degrees_unchecked(
            self.latitude + t * (toward.latitude - self.latitude),
            self.longitude + t * (toward.longitude - self.longitude),
        )
    }
}

/// Great-circle distance in kilometers using the haversine formula.
pub fn haversine_distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let (cos_a, cos_b) = (a.latitude.to_radians().cos(), b.latitude.to_radians().cos());
    // Rounding can push `h` just past 1 for near-antipodal points.
    let h = ((d_lat / 2.0).sin().powi(2) + cos_a * cos_b * (d_lon / 2.0).sin().powi(2))
        .clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Same distance as [`haversine_distance_km`], in meters, for threshold checks.
pub fn planar_distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    haversine_distance_km(a, b) * 1000.0
}

/// Initial great-circle bearing from `a` to `b`, degrees clockwise from north in `[0, 360)`.
pub fn initial_bearing_deg(a: &Coordinate, b: &Coordinate) -> f64 {
    let (lat_a, lat_b) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lon = (b.longitude - a.longitude).to_radians();

    let y = d_lon.sin() * lat_b.cos();
    let x = lat_a.cos() * lat_b.sin() - lat_a.sin() * lat_b.cos() * d_lon.cos();

    y.atan2(x).to_degrees().rem_euclid(360.0)
}
