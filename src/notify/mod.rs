use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::driver::Driver;
use crate::models::ride::{CancelActor, PaymentMode, Ride, RideStatus, VehicleType};
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    RideRequest,
    RideConfirmed,
    SearchUpdate,
    RideAccepted,
    RideStarted,
    RideCancelled,
    RideTerminated,
    RideFailed,
    RideCompleted,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::RideRequest => "ride-request",
            EventKind::RideConfirmed => "ride-confirmed",
            EventKind::SearchUpdate => "search-update",
            EventKind::RideAccepted => "ride-accepted",
            EventKind::RideStarted => "ride-started",
            EventKind::RideCancelled => "ride-cancelled",
            EventKind::RideTerminated => "ride-terminated",
            EventKind::RideFailed => "ride-failed",
            EventKind::RideCompleted => "ride-completed",
        }
    }
}

/// Outward view of a ride. Payment references never leave the service;
/// the OTP is included only on the events that hand it to the rider.
#[derive(Debug, Clone, Serialize)]
pub struct RideSnapshot {
    pub id: Uuid,
    pub rider: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<Uuid>,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub vehicle_type: VehicleType,
    pub distance_km: f64,
    pub fare: u64,
    pub payment_mode: PaymentMode,
    pub sent_to_radius: f64,
    pub status: RideStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<CancelActor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl RideSnapshot {
    pub fn from_ride(ride: &Ride) -> Self {
        Self {
            id: ride.id,
            rider: ride.rider,
            driver: ride.driver,
            pickup: ride.pickup,
            dropoff: ride.dropoff,
            vehicle_type: ride.vehicle_type,
            distance_km: ride.distance_km,
            fare: ride.fare,
            payment_mode: ride.payment_mode,
            sent_to_radius: ride.sent_to_radius,
            status: ride.status,
            cancelled_by: ride.cancelled_by,
            otp: None,
            created_at: ride.created_at,
        }
    }

    /// Snapshot carrying the current OTP, for `ride-accepted` and
    /// `ride-started`.
    pub fn with_otp(ride: &Ride) -> Self {
        Self {
            otp: ride.otp,
            ..Self::from_ride(ride)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RideEvent {
    #[serde(skip_serializing)]
    pub recipient: Uuid,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub ride: RideSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
}

struct Connection {
    id: Uuid,
    tx: mpsc::UnboundedSender<RideEvent>,
}

/// Maps a recipient to its single live connection. Delivery is
/// fire-and-forget: events for recipients without a connection are dropped
/// and counted, never queued. Every event is also mirrored onto a
/// broadcast channel that feeds the gRPC watch stream.
pub struct Notifier {
    connections: DashMap<Uuid, Connection>,
    events_tx: broadcast::Sender<RideEvent>,
    metrics: Metrics,
}

impl Notifier {
    pub fn new(event_buffer_size: usize, metrics: Metrics) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            connections: DashMap::new(),
            events_tx,
            metrics,
        }
    }

    /// Registers a live connection for `recipient`. A later registration
    /// overwrites an earlier one; there is no multi-device fan-out. The
    /// returned id must be passed back to [`Notifier::unregister`].
    pub fn register(&self, recipient: Uuid) -> (Uuid, mpsc::UnboundedReceiver<RideEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        self.connections.insert(recipient, Connection { id, tx });
        self.metrics
            .connected_clients
            .set(self.connections.len() as i64);

        (id, rx)
    }

    /// Removes the mapping, unless a newer connection already replaced it.
    pub fn unregister(&self, recipient: Uuid, connection_id: Uuid) {
        self.connections
            .remove_if(&recipient, |_, connection| connection.id == connection_id);
        self.metrics
            .connected_clients
            .set(self.connections.len() as i64);
    }

    pub fn connected(&self) -> usize {
        self.connections.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RideEvent> {
        self.events_tx.subscribe()
    }

    pub fn send(
        &self,
        recipient: Uuid,
        kind: EventKind,
        message: Option<String>,
        ride: RideSnapshot,
    ) {
        self.send_with_driver(recipient, kind, message, ride, None);
    }

    pub fn send_with_driver(
        &self,
        recipient: Uuid,
        kind: EventKind,
        message: Option<String>,
        ride: RideSnapshot,
        driver: Option<Driver>,
    ) {
        let event = RideEvent {
            recipient,
            kind,
            message,
            ride,
            driver,
        };

        let _ = self.events_tx.send(event.clone());

        let delivered = self
            .connections
            .get(&recipient)
            .is_some_and(|connection| connection.tx.send(event).is_ok());

        if !delivered {
            self.metrics.notifications_dropped_total.inc();
            debug!(%recipient, kind = kind.as_str(), "recipient not connected, event dropped");
        }
    }
}
