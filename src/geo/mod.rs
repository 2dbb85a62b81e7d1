use serde::{Deserialize, Serialize};

use crate::error::AppError;

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Parses a `[lng, lat]` coordinate pair as sent by clients.
    pub fn from_coords(coords: &[f64], field: &str) -> Result<Self, AppError> {
        let [lng, lat] = coords else {
            return Err(AppError::BadRequest(format!(
                "{field} must be a [lng, lat] pair"
            )));
        };

        if !lng.is_finite() || !lat.is_finite() {
            return Err(AppError::BadRequest(format!(
                "{field} coordinates must be finite numbers"
            )));
        }

        Ok(Self {
            lat: *lat,
            lng: *lng,
        })
    }

    pub fn coords(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}
