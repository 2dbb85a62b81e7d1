use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Bike,
    Car,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Cash,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Processing,
    Accepted,
    Started,
    Completed,
    Cancelled,
    Terminated,
    Failed,
}

impl RideStatus {
    /// Terminal states are absorbing; no transition is accepted from them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RideStatus::Completed
                | RideStatus::Cancelled
                | RideStatus::Terminated
                | RideStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelActor {
    Rider,
    Driver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub rider: Uuid,
    pub driver: Option<Uuid>,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub vehicle_type: VehicleType,
    pub distance_km: f64,
    pub fare: u64,
    pub charged_total: u64,
    pub payment_mode: PaymentMode,
    pub payment: Option<Uuid>,
    /// Last radius tier (km) the ride was dispatched at.
    pub sent_to_radius: f64,
    pub otp: Option<u32>,
    pub status: RideStatus,
    pub cancelled_by: Option<CancelActor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Provisional booking held between checkout-session creation and the
/// payment webhook. Keyed by the payment session; expires after a TTL and
/// is removed once converted into a real ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporaryRide {
    pub id: Uuid,
    pub rider: Uuid,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub vehicle_type: VehicleType,
    pub distance_km: f64,
    pub fare: u64,
    pub charged_total: u64,
    pub payment_session_id: String,
    pub created_at: DateTime<Utc>,
}

impl TemporaryRide {
    pub fn into_ride(self, payment: Uuid, first_radius_km: f64) -> Ride {
        let now = Utc::now();

        Ride {
            id: self.id,
            rider: self.rider,
            driver: None,
            pickup: self.pickup,
            dropoff: self.dropoff,
            vehicle_type: self.vehicle_type,
            distance_km: self.distance_km,
            fare: self.fare,
            charged_total: self.charged_total,
            payment_mode: PaymentMode::Online,
            payment: Some(payment),
            sent_to_radius: first_radius_km,
            otp: None,
            status: RideStatus::Processing,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}
