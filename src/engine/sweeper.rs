use std::sync::Arc;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::engine::{dispatch, matcher};
use crate::error::AppError;
use crate::models::ride::Ride;
use crate::notify::{EventKind, RideSnapshot};
use crate::state::AppState;

/// Background task that re-dispatches rides stuck in `processing`: one
/// radius escalation per pass, then termination with refund once the last
/// tier has been exhausted.
pub async fn run_sweeper(state: Arc<AppState>) {
    info!(
        interval_secs = state.dispatch.sweep_interval.as_secs(),
        stale_after_secs = state.dispatch.stale_after.as_secs(),
        "escalation sweeper started"
    );

    let mut ticker = tokio::time::interval(state.dispatch.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep_once(&state).await;
    }
}

/// One sweep pass. Each stale ride is handled in isolation: a refund or
/// notification problem on one ride never stops the rest of the batch.
pub async fn sweep_once(state: &AppState) {
    let now = Utc::now();

    let evicted = state.temp_rides.evict_expired(now);
    if evicted > 0 {
        debug!(evicted, "abandoned provisional bookings evicted");
    }

    let cutoff = now
        - chrono::Duration::from_std(state.dispatch.stale_after)
            .unwrap_or_else(|_| chrono::Duration::seconds(120));

    for ride in state.rides.stale_processing(cutoff) {
        if let Err(err) = handle_stale_ride(state, &ride).await {
            error!(ride_id = %ride.id, error = %err, "stale ride handling failed");
        }
    }
}

async fn handle_stale_ride(state: &AppState, ride: &Ride) -> Result<(), AppError> {
    match state.dispatch.next_radius_km(ride.sent_to_radius) {
        None => {
            // Already searched at the widest tier; give up.
            let Some(terminated) = state.rides.terminate(&ride.id) else {
                return Ok(()); // a concurrent transition got there first
            };

            state
                .metrics
                .sweep_actions_total
                .with_label_values(&["terminated"])
                .inc();
            state
                .metrics
                .rides_total
                .with_label_values(&["terminated"])
                .inc();

            dispatch::issue_refund(state, &terminated).await?;

            state.notifier.send(
                terminated.rider,
                EventKind::RideTerminated,
                Some("Sorry, we could not find you a driver. Your refund has been initiated!".to_string()),
                RideSnapshot::from_ride(&terminated),
            );

            info!(ride_id = %terminated.id, "stale ride terminated");
        }
        Some(next_tier) => {
            // Escalate first: the tier guard makes overlapping ticks agree
            // on a single winner before anything is re-sent.
            let Some(escalated) = state.rides.escalate(&ride.id, ride.sent_to_radius, next_tier)
            else {
                return Ok(());
            };

            state
                .metrics
                .sweep_actions_total
                .with_label_values(&["escalated"])
                .inc();

            let candidates = matcher::find(
                &state.drivers,
                &escalated.pickup,
                next_tier,
                escalated.vehicle_type,
            );

            state.notifier.send(
                escalated.rider,
                EventKind::SearchUpdate,
                Some(format!("Looking for drivers within {next_tier} kms")),
                RideSnapshot::from_ride(&escalated),
            );

            for candidate in &candidates {
                state.notifier.send(
                    candidate.driver.id,
                    EventKind::RideRequest,
                    None,
                    RideSnapshot::from_ride(&escalated),
                );
            }

            info!(
                ride_id = %escalated.id,
                radius_km = next_tier,
                drivers = candidates.len(),
                "stale ride escalated"
            );
        }
    }

    Ok(())
}
