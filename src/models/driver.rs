use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::ride::VehicleType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleDetails {
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub model: String,
    pub number_plate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub vehicle: VehicleDetails,
    pub updated_at: DateTime<Utc>,
}
