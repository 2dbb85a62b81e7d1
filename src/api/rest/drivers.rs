use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::driver::{Driver, VehicleDetails};
use crate::models::ride::VehicleType;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/location", patch(update_driver_location))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub location: GeoPoint,
    pub vehicle_type: VehicleType,
    pub vehicle_model: String,
    pub number_plate: String,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.number_plate.trim().is_empty() {
        return Err(AppError::BadRequest(
            "number plate cannot be empty".to_string(),
        ));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name,
        location: payload.location,
        vehicle: VehicleDetails {
            vehicle_type: payload.vehicle_type,
            model: payload.vehicle_model,
            number_plate: payload.number_plate,
        },
        updated_at: Utc::now(),
    };

    state.drivers.insert(driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    Json(state.drivers.list())
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver = state
        .drivers
        .update_location(&id, payload.location)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    Ok(Json(driver))
}
