//! Geographic primitives: validated points, great-circle distance and the
//! bounding boxes used to pre-filter spatial index lookups.

use crate::error::{Result, ReviewError};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A point on Earth's surface, stored as (longitude, latitude) in degrees.
///
/// Only constructible through [`GeoPoint::new`], so every instance holds
/// coordinates inside the valid ranges. Serializes as a GeoJSON point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoJsonPoint", into = "GeoJsonPoint")]
pub struct GeoPoint {
    lng: f64,
    lat: f64,
}

impl GeoPoint {
    pub fn new(lng: f64, lat: f64) -> Result<Self> {
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(ReviewError::validation(format!(
                "Longitude must be between -180 and 180, got {}",
                lng
            )));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ReviewError::validation(format!(
                "Latitude must be between -90 and 90, got {}",
                lat
            )));
        }
        Ok(GeoPoint { lng, lat })
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance(self.lat, self.lng, other.lat, other.lng)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeoJsonPoint {
    #[serde(rename = "type")]
    kind: String,
    coordinates: [f64; 2],
}

impl TryFrom<GeoJsonPoint> for GeoPoint {
    type Error = ReviewError;

    fn try_from(raw: GeoJsonPoint) -> Result<Self> {
        if raw.kind != "Point" {
            return Err(ReviewError::validation(format!(
                "Unsupported geometry type '{}', expected 'Point'",
                raw.kind
            )));
        }
        GeoPoint::new(raw.coordinates[0], raw.coordinates[1])
    }
}

impl From<GeoPoint> for GeoJsonPoint {
    fn from(point: GeoPoint) -> Self {
        GeoJsonPoint {
            kind: "Point".to_string(),
            coordinates: [point.lng, point.lat],
        }
    }
}

/// Haversine distance between two (lat, lng) pairs, in meters.
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1 for antipodal pairs.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Degree-space box that fully contains a search circle.
///
/// The longitude extent is split in two when the circle crosses the
/// antimeridian, and widened to the whole globe when it covers a pole.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub lng_spans: Vec<(f64, f64)>,
}

impl GeoBounds {
    pub fn around(center: &GeoPoint, radius_m: f64) -> Self {
        let angular = radius_m / EARTH_RADIUS_METERS;
        let min_lat = center.lat - angular.to_degrees();
        let max_lat = center.lat + angular.to_degrees();

        if angular >= std::f64::consts::PI || min_lat <= -90.0 || max_lat >= 90.0 {
            return GeoBounds {
                min_lat: min_lat.max(-90.0),
                max_lat: max_lat.min(90.0),
                lng_spans: vec![(-180.0, 180.0)],
            };
        }

        let ratio = angular.sin() / center.lat.to_radians().cos();
        if ratio >= 1.0 {
            return GeoBounds {
                min_lat,
                max_lat,
                lng_spans: vec![(-180.0, 180.0)],
            };
        }

        let delta_lng = ratio.asin().to_degrees();
        let min_lng = center.lng - delta_lng;
        let max_lng = center.lng + delta_lng;

        let lng_spans = if min_lng < -180.0 {
            vec![(min_lng + 360.0, 180.0), (-180.0, max_lng)]
        } else if max_lng > 180.0 {
            vec![(min_lng, 180.0), (-180.0, max_lng - 360.0)]
        } else {
            vec![(min_lng, max_lng)]
        };

        GeoBounds {
            min_lat,
            max_lat,
            lng_spans,
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && self
                .lng_spans
                .iter()
                .any(|(lo, hi)| point.lng >= *lo && point.lng <= *hi)
    }
}
