use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::models::driver::{Driver, VehicleDetails};
use crate::models::ride::{PaymentMode, Ride, RideStatus, VehicleType};
use crate::notify;
use crate::state::AppState;

pub mod pb {
    tonic::include_proto!("dispatch");
}

use pb::dispatch_service_server::DispatchService;
use pb::{
    CreateDriverRequest, DriverResponse, GeoPoint, GetRideRequest, ListRidesRequest,
    ListRidesResponse, RideEvent, RideResponse, UpdateDriverLocationRequest,
    WatchRideEventsRequest,
};

pub struct GrpcDispatchService {
    state: Arc<AppState>,
}

impl GrpcDispatchService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

fn driver_to_proto(d: &Driver) -> DriverResponse {
    DriverResponse {
        id: d.id.to_string(),
        name: d.name.clone(),
        location: Some(GeoPoint {
            lat: d.location.lat,
            lng: d.location.lng,
        }),
        vehicle_type: vehicle_type_str(d.vehicle.vehicle_type).to_string(),
        vehicle_model: d.vehicle.model.clone(),
        number_plate: d.vehicle.number_plate.clone(),
        updated_at: d.updated_at.to_rfc3339(),
    }
}

fn ride_to_proto(r: &Ride) -> RideResponse {
    RideResponse {
        id: r.id.to_string(),
        rider: r.rider.to_string(),
        driver: r.driver.map(|d| d.to_string()).unwrap_or_default(),
        pickup: Some(GeoPoint {
            lat: r.pickup.lat,
            lng: r.pickup.lng,
        }),
        dropoff: Some(GeoPoint {
            lat: r.dropoff.lat,
            lng: r.dropoff.lng,
        }),
        vehicle_type: vehicle_type_str(r.vehicle_type).to_string(),
        distance_km: r.distance_km,
        fare: r.fare,
        payment_mode: match r.payment_mode {
            PaymentMode::Cash => "cash".to_string(),
            PaymentMode::Online => "online".to_string(),
        },
        sent_to_radius: r.sent_to_radius,
        status: status_str(r.status).to_string(),
        created_at: r.created_at.to_rfc3339(),
    }
}

fn snapshot_to_proto(s: &notify::RideSnapshot) -> RideResponse {
    RideResponse {
        id: s.id.to_string(),
        rider: s.rider.to_string(),
        driver: s.driver.map(|d| d.to_string()).unwrap_or_default(),
        pickup: Some(GeoPoint {
            lat: s.pickup.lat,
            lng: s.pickup.lng,
        }),
        dropoff: Some(GeoPoint {
            lat: s.dropoff.lat,
            lng: s.dropoff.lng,
        }),
        vehicle_type: vehicle_type_str(s.vehicle_type).to_string(),
        distance_km: s.distance_km,
        fare: s.fare,
        payment_mode: match s.payment_mode {
            PaymentMode::Cash => "cash".to_string(),
            PaymentMode::Online => "online".to_string(),
        },
        sent_to_radius: s.sent_to_radius,
        status: status_str(s.status).to_string(),
        created_at: s.created_at.to_rfc3339(),
    }
}

fn status_str(status: RideStatus) -> &'static str {
    match status {
        RideStatus::Processing => "processing",
        RideStatus::Accepted => "accepted",
        RideStatus::Started => "started",
        RideStatus::Completed => "completed",
        RideStatus::Cancelled => "cancelled",
        RideStatus::Terminated => "terminated",
        RideStatus::Failed => "failed",
    }
}

fn vehicle_type_str(vehicle_type: VehicleType) -> &'static str {
    match vehicle_type {
        VehicleType::Bike => "bike",
        VehicleType::Car => "car",
    }
}

fn parse_vehicle_type(s: &str) -> Result<VehicleType, Status> {
    match s {
        "bike" => Ok(VehicleType::Bike),
        "car" => Ok(VehicleType::Car),
        other => Err(Status::invalid_argument(format!(
            "unknown vehicle type: {other}"
        ))),
    }
}

fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, Status> {
    raw.parse::<Uuid>()
        .map_err(|_| Status::invalid_argument(format!("{field} is not a valid id")))
}

#[tonic::async_trait]
impl DispatchService for GrpcDispatchService {
    async fn create_driver(
        &self,
        request: Request<CreateDriverRequest>,
    ) -> Result<Response<DriverResponse>, Status> {
        let req = request.into_inner();

        if req.name.trim().is_empty() {
            return Err(Status::invalid_argument("name cannot be empty"));
        }

        let location = req
            .location
            .ok_or_else(|| Status::invalid_argument("location is required"))?;
        let vehicle_type = parse_vehicle_type(&req.vehicle_type)?;

        let driver = Driver {
            id: Uuid::new_v4(),
            name: req.name,
            location: crate::geo::GeoPoint {
                lat: location.lat,
                lng: location.lng,
            },
            vehicle: VehicleDetails {
                vehicle_type,
                model: req.vehicle_model,
                number_plate: req.number_plate,
            },
            updated_at: Utc::now(),
        };

        self.state.drivers.insert(driver.clone());
        Ok(Response::new(driver_to_proto(&driver)))
    }

    async fn update_driver_location(
        &self,
        request: Request<UpdateDriverLocationRequest>,
    ) -> Result<Response<DriverResponse>, Status> {
        let req = request.into_inner();
        let driver_id = parse_uuid(&req.driver_id, "driver_id")?;
        let location = req
            .location
            .ok_or_else(|| Status::invalid_argument("location is required"))?;

        let driver = self
            .state
            .drivers
            .update_location(
                &driver_id,
                crate::geo::GeoPoint {
                    lat: location.lat,
                    lng: location.lng,
                },
            )
            .ok_or_else(|| Status::not_found(format!("driver {driver_id} not found")))?;

        Ok(Response::new(driver_to_proto(&driver)))
    }

    async fn get_ride(
        &self,
        request: Request<GetRideRequest>,
    ) -> Result<Response<RideResponse>, Status> {
        let req = request.into_inner();
        let ride_id = parse_uuid(&req.ride_id, "ride_id")?;

        let ride = self
            .state
            .rides
            .get(&ride_id)
            .ok_or_else(|| Status::not_found(format!("ride {ride_id} not found")))?;

        Ok(Response::new(ride_to_proto(&ride)))
    }

    async fn list_rides(
        &self,
        _request: Request<ListRidesRequest>,
    ) -> Result<Response<ListRidesResponse>, Status> {
        let rides = self
            .state
            .rides
            .list()
            .iter()
            .map(ride_to_proto)
            .collect();

        Ok(Response::new(ListRidesResponse { rides }))
    }

    type WatchRideEventsStream = Pin<Box<dyn Stream<Item = Result<RideEvent, Status>> + Send>>;

    async fn watch_ride_events(
        &self,
        _request: Request<WatchRideEventsRequest>,
    ) -> Result<Response<Self::WatchRideEventsStream>, Status> {
        let rx = self.state.notifier.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(|result| match result {
            Ok(event) => Some(Ok(RideEvent {
                recipient: event.recipient.to_string(),
                kind: event.kind.as_str().to_string(),
                message: event.message.clone().unwrap_or_default(),
                ride: Some(snapshot_to_proto(&event.ride)),
            })),
            Err(_) => None,
        });

        Ok(Response::new(Box::pin(stream)))
    }
}
