use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{fare, matcher};
use crate::error::AppError;
use crate::external::CheckoutSession;
use crate::geo::{self, GeoPoint};
use crate::models::payment::{PaymentRecord, PaymentStatus};
use crate::models::ride::{CancelActor, PaymentMode, Ride, RideStatus, TemporaryRide, VehicleType};
use crate::notify::{EventKind, RideSnapshot};
use crate::state::AppState;

pub struct RideRequest {
    pub rider: Uuid,
    pub pickup: Vec<f64>,
    pub dropoff: Vec<f64>,
    pub vehicle_type: VehicleType,
    pub payment_mode: PaymentMode,
}

pub enum InitiateOutcome {
    /// Cash ride, created and dispatched immediately.
    Dispatched(Ride),
    /// Online ride, parked until the payment webhook confirms the session.
    AwaitingPayment {
        temp: TemporaryRide,
        checkout: CheckoutSession,
    },
}

/// Validates the request, pre-checks driver availability across all radius
/// tiers before any money moves, prices the trip, and either dispatches
/// (cash) or opens a checkout session (online).
pub async fn initiate_ride(
    state: &AppState,
    request: RideRequest,
) -> Result<InitiateOutcome, AppError> {
    let pickup = GeoPoint::from_coords(&request.pickup, "pickup")?;
    let dropoff = GeoPoint::from_coords(&request.dropoff, "dropoff")?;

    let (tier, candidates) = matcher::find_with_escalation(
        &state.drivers,
        &pickup,
        &state.dispatch.search_radii_km,
        request.vehicle_type,
    )
    .ok_or(AppError::NoDriversAvailable)?;

    let distance_km = geo::haversine_km(&pickup, &dropoff);
    let fare = fare::fare_for_distance(&state.dispatch, distance_km);
    let charged_total = fare::charged_total(&state.dispatch, fare);

    match request.payment_mode {
        PaymentMode::Cash => {
            let now = Utc::now();
            let ride = Ride {
                id: Uuid::new_v4(),
                rider: request.rider,
                driver: None,
                pickup,
                dropoff,
                vehicle_type: request.vehicle_type,
                distance_km,
                fare,
                charged_total,
                payment_mode: PaymentMode::Cash,
                payment: None,
                sent_to_radius: tier,
                otp: None,
                status: RideStatus::Processing,
                cancelled_by: None,
                created_at: now,
                updated_at: now,
            };

            state.rides.insert(ride.clone());
            state.metrics.rides_total.with_label_values(&["created"]).inc();
            fan_out(state, &ride, &candidates);

            info!(ride_id = %ride.id, radius_km = tier, drivers = candidates.len(), "cash ride dispatched");
            Ok(InitiateOutcome::Dispatched(ride))
        }
        PaymentMode::Online => {
            let temp_id = Uuid::new_v4();
            let checkout = state
                .gateway
                .create_checkout_session(&temp_id.to_string(), charged_total * 100, "book-ride")
                .await?;

            let temp = TemporaryRide {
                id: temp_id,
                rider: request.rider,
                pickup,
                dropoff,
                vehicle_type: request.vehicle_type,
                distance_km,
                fare,
                charged_total,
                payment_session_id: checkout.id.clone(),
                created_at: Utc::now(),
            };
            state.temp_rides.insert(temp.clone());

            info!(ride_id = %temp.id, session_id = %checkout.id, "booking awaiting payment");
            Ok(InitiateOutcome::AwaitingPayment { temp, checkout })
        }
    }
}

/// Payment-webhook entry point: converts the provisional booking into a
/// real ride and dispatches it. If every tier comes up empty the ride is
/// marked `failed` and the payment refunded right away.
pub async fn confirm_and_dispatch(
    state: &AppState,
    payment: PaymentRecord,
) -> Result<Ride, AppError> {
    let temp = state.temp_rides.take(&payment.session_id).ok_or_else(|| {
        AppError::NotFound(format!(
            "no pending booking for session {}",
            payment.session_id
        ))
    })?;

    let first_tier = state.dispatch.search_radii_km.first().copied().unwrap_or_default();
    let payment_id = payment.id;
    state.payments.insert(payment.clone());

    let ride = temp.into_ride(payment_id, first_tier);
    state.rides.insert(ride.clone());
    state.metrics.rides_total.with_label_values(&["created"]).inc();

    // Receipts and confirmations never block dispatch.
    spawn_confirmation_tasks(state, ride.clone(), payment);

    let found = matcher::find_with_escalation(
        &state.drivers,
        &ride.pickup,
        &state.dispatch.search_radii_km,
        ride.vehicle_type,
    );

    match found {
        None => {
            let failed = state.rides.fail(&ride.id).unwrap_or(ride);
            state.metrics.rides_total.with_label_values(&["failed"]).inc();

            if let Err(err) = issue_refund(state, &failed).await {
                warn!(ride_id = %failed.id, error = %err, "refund for failed dispatch did not go through");
            }

            state.notifier.send(
                failed.rider,
                EventKind::RideFailed,
                Some(
                    "Sorry, no driver is available in your area. Your refund has been initiated!"
                        .to_string(),
                ),
                RideSnapshot::from_ride(&failed),
            );

            info!(ride_id = %failed.id, "dispatch failed, no drivers at any tier");
            Ok(failed)
        }
        Some((tier, candidates)) => {
            let ride = if tier > first_tier {
                state
                    .rides
                    .escalate(&ride.id, first_tier, tier)
                    .unwrap_or(ride)
            } else {
                ride
            };

            fan_out(state, &ride, &candidates);
            info!(ride_id = %ride.id, radius_km = tier, drivers = candidates.len(), "paid ride dispatched");
            Ok(ride)
        }
    }
}

pub fn accept_ride(state: &AppState, ride_id: Uuid, driver_id: Uuid) -> Result<Ride, AppError> {
    let driver = state
        .drivers
        .get(&driver_id)
        .ok_or_else(|| AppError::BadRequest("driver is not registered".to_string()))?;

    let otp = fare::generate_otp();
    let ride = state.rides.accept(&ride_id, driver_id, otp).ok_or_else(|| {
        AppError::PreconditionFailed("ride has already been accepted or not found".to_string())
    })?;

    state.metrics.rides_total.with_label_values(&["accepted"]).inc();
    state.notifier.send_with_driver(
        ride.rider,
        EventKind::RideAccepted,
        None,
        RideSnapshot::with_otp(&ride),
        Some(driver),
    );

    info!(ride_id = %ride.id, %driver_id, "ride accepted");
    Ok(ride)
}

pub fn start_ride(
    state: &AppState,
    ride_id: Uuid,
    driver_id: Uuid,
    otp: u32,
) -> Result<Ride, AppError> {
    let next_otp = fare::generate_otp();
    let ride = state
        .rides
        .start(&ride_id, driver_id, otp, next_otp)
        .ok_or_else(|| {
            AppError::PreconditionFailed("invalid OTP or ride cannot be started".to_string())
        })?;

    state.metrics.rides_total.with_label_values(&["started"]).inc();
    state.notifier.send(
        ride.rider,
        EventKind::RideStarted,
        Some("Your ride has been started!".to_string()),
        RideSnapshot::with_otp(&ride),
    );

    info!(ride_id = %ride.id, "ride started");
    Ok(ride)
}

pub async fn complete_ride(
    state: &AppState,
    ride_id: Uuid,
    driver_id: Uuid,
    otp: u32,
) -> Result<Ride, AppError> {
    let ride = state
        .rides
        .complete(&ride_id, driver_id, otp)
        .ok_or_else(|| {
            AppError::PreconditionFailed("invalid OTP or ride cannot be completed".to_string())
        })?;

    state.metrics.rides_total.with_label_values(&["completed"]).inc();

    if let Err(err) = state.earnings.record_earning(&ride).await {
        warn!(ride_id = %ride.id, error = %err, "earning recording failed");
    }

    state.notifier.send(
        ride.rider,
        EventKind::RideCompleted,
        Some("Your ride has been completed!".to_string()),
        RideSnapshot::from_ride(&ride),
    );

    info!(ride_id = %ride.id, "ride completed");
    Ok(ride)
}

pub async fn cancel_ride(
    state: &AppState,
    ride_id: Uuid,
    actor: CancelActor,
    actor_id: Uuid,
) -> Result<Ride, AppError> {
    let ride = state
        .rides
        .cancel(&ride_id, actor, actor_id)
        .ok_or_else(|| AppError::PreconditionFailed("ride cannot be cancelled".to_string()))?;

    state.metrics.rides_total.with_label_values(&["cancelled"]).inc();

    if let Err(err) = issue_refund(state, &ride).await {
        warn!(ride_id = %ride.id, error = %err, "refund on cancellation did not go through");
    }

    // The counterparty hears about it only once a driver was assigned.
    if let Some(driver) = ride.driver {
        let counterparty = match actor {
            CancelActor::Rider => driver,
            CancelActor::Driver => ride.rider,
        };
        state.notifier.send(
            counterparty,
            EventKind::RideCancelled,
            Some("Your ride has been cancelled.".to_string()),
            RideSnapshot::from_ride(&ride),
        );
    }

    info!(ride_id = %ride.id, actor = ?actor, "ride cancelled");
    Ok(ride)
}

/// Refunds the ride's payment, once. Cash rides and already-refunded
/// payments are a no-op, so cancel and sweep paths can both call this
/// safely.
pub async fn issue_refund(state: &AppState, ride: &Ride) -> Result<(), AppError> {
    let Some(payment_id) = ride.payment else {
        return Ok(());
    };

    let Some(payment) = state.payments.get(&payment_id) else {
        return Err(AppError::Internal(format!(
            "payment {payment_id} not found for ride {}",
            ride.id
        )));
    };

    if payment.status == PaymentStatus::Refunded {
        return Ok(());
    }

    let refund_id = state.gateway.refund(&payment.intent_id).await?;
    state.payments.mark_refunded(&payment.id, Some(refund_id));
    state.metrics.refunds_total.inc();
    Ok(())
}

fn fan_out(state: &AppState, ride: &Ride, candidates: &[matcher::Candidate]) {
    state.notifier.send(
        ride.rider,
        EventKind::RideConfirmed,
        Some("Your ride has been confirmed. Looking for your driver...".to_string()),
        RideSnapshot::from_ride(ride),
    );

    for candidate in candidates {
        state.notifier.send(
            candidate.driver.id,
            EventKind::RideRequest,
            None,
            RideSnapshot::from_ride(ride),
        );
    }
}

fn spawn_confirmation_tasks(state: &AppState, ride: Ride, payment: PaymentRecord) {
    let invoices = state.invoices.clone();
    let messenger = state.messenger.clone();

    tokio::spawn(async move {
        if let Err(err) = invoices.generate(&ride, &payment).await {
            warn!(ride_id = %ride.id, error = %err, "invoice generation failed");
        }
        if let Err(err) = messenger.send_booking_confirmation(&ride).await {
            warn!(ride_id = %ride.id, error = %err, "booking confirmation failed");
        }
    });
}
