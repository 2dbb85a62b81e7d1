use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::engine::dispatch::{self, InitiateOutcome, RideRequest};
use crate::error::AppError;
use crate::models::ride::{CancelActor, PaymentMode, VehicleType};
use crate::notify::RideSnapshot;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides", post(create_ride).get(list_rides))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/accept", post(accept_ride))
        .route("/rides/:id/start", post(start_ride))
        .route("/rides/:id/complete", post(complete_ride))
        .route("/rides/:id/cancel", post(cancel_ride))
}

#[derive(Deserialize)]
pub struct CreateRideRequest {
    pub rider: Uuid,
    pub pickup: Vec<f64>,
    pub dropoff: Vec<f64>,
    pub vehicle_type: VehicleType,
    pub payment_mode: PaymentMode,
}

#[derive(Serialize)]
#[serde(untagged)]
enum CreateRideResponse {
    Dispatched {
        ride: RideSnapshot,
    },
    AwaitingPayment {
        ride_id: Uuid,
        session_id: String,
        checkout_url: String,
        fare: u64,
        charged_total: u64,
        distance_km: f64,
    },
}

#[derive(Deserialize)]
pub struct AcceptRideRequest {
    pub driver: Uuid,
}

#[derive(Deserialize)]
pub struct OtpRequest {
    pub driver: Uuid,
    pub otp: u32,
}

#[derive(Deserialize)]
pub struct CancelRideRequest {
    pub actor: CancelActor,
    pub actor_id: Uuid,
}

async fn create_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRideRequest>,
) -> Result<Json<CreateRideResponse>, AppError> {
    let start = Instant::now();
    let result = dispatch::initiate_ride(
        &state,
        RideRequest {
            rider: payload.rider,
            pickup: payload.pickup,
            dropoff: payload.dropoff,
            vehicle_type: payload.vehicle_type,
            payment_mode: payload.payment_mode,
        },
    )
    .await;

    let outcome_label = if result.is_ok() { "success" } else { "error" };
    state
        .metrics
        .dispatch_latency_seconds
        .with_label_values(&[outcome_label])
        .observe(start.elapsed().as_secs_f64());

    match result? {
        InitiateOutcome::Dispatched(ride) => Ok(Json(CreateRideResponse::Dispatched {
            ride: RideSnapshot::from_ride(&ride),
        })),
        InitiateOutcome::AwaitingPayment { temp, checkout } => {
            Ok(Json(CreateRideResponse::AwaitingPayment {
                ride_id: temp.id,
                session_id: checkout.id,
                checkout_url: checkout.url,
                fare: temp.fare,
                charged_total: temp.charged_total,
                distance_km: temp.distance_km,
            }))
        }
    }
}

async fn list_rides(State(state): State<Arc<AppState>>) -> Json<Vec<RideSnapshot>> {
    let rides = state
        .rides
        .list()
        .iter()
        .map(RideSnapshot::from_ride)
        .collect();
    Json(rides)
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RideSnapshot>, AppError> {
    let ride = state
        .rides
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("ride {id} not found")))?;

    Ok(Json(RideSnapshot::from_ride(&ride)))
}

async fn accept_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AcceptRideRequest>,
) -> Result<Json<RideSnapshot>, AppError> {
    let ride = dispatch::accept_ride(&state, id, payload.driver)?;

    // The OTP travels to the rider over the live channel, never back to
    // the driver.
    Ok(Json(RideSnapshot::from_ride(&ride)))
}

async fn start_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<OtpRequest>,
) -> Result<Json<RideSnapshot>, AppError> {
    let ride = dispatch::start_ride(&state, id, payload.driver, payload.otp)?;
    Ok(Json(RideSnapshot::from_ride(&ride)))
}

async fn complete_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<OtpRequest>,
) -> Result<Json<RideSnapshot>, AppError> {
    let ride = dispatch::complete_ride(&state, id, payload.driver, payload.otp).await?;
    Ok(Json(RideSnapshot::from_ride(&ride)))
}

async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRideRequest>,
) -> Result<Json<RideSnapshot>, AppError> {
    let ride = dispatch::cancel_ride(&state, id, payload.actor, payload.actor_id).await?;
    Ok(Json(RideSnapshot::from_ride(&ride)))
}
