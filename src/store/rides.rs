use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::ride::{CancelActor, Ride, RideStatus};

/// Ride records with atomic conditional transitions.
///
/// Every mutation checks its precondition and applies its change while
/// holding the map entry guard, so concurrent callers observe exactly one
/// successful transition. `None` means the precondition did not hold —
/// callers translate that into a specific client error.
#[derive(Default)]
pub struct RideStore {
    rides: DashMap<Uuid, Ride>,
}

impl RideStore {
    pub fn new() -> Self {
        Self {
            rides: DashMap::new(),
        }
    }

    pub fn insert(&self, ride: Ride) {
        self.rides.insert(ride.id, ride);
    }

    pub fn get(&self, id: &Uuid) -> Option<Ride> {
        self.rides.get(id).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<Ride> {
        self.rides.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rides.is_empty()
    }

    fn update_if(
        &self,
        id: &Uuid,
        guard: impl FnOnce(&Ride) -> bool,
        apply: impl FnOnce(&mut Ride),
    ) -> Option<Ride> {
        let mut entry = self.rides.get_mut(id)?;
        let ride = entry.value_mut();

        if !guard(ride) {
            return None;
        }

        apply(ride);
        ride.updated_at = Utc::now();
        Some(ride.clone())
    }

    /// `processing` → `accepted`. Sets the driver exactly once; of N
    /// concurrent callers exactly one sees `Some`.
    pub fn accept(&self, id: &Uuid, driver: Uuid, otp: u32) -> Option<Ride> {
        self.update_if(
            id,
            |ride| ride.status == RideStatus::Processing && ride.driver.is_none(),
            |ride| {
                ride.driver = Some(driver);
                ride.otp = Some(otp);
                ride.status = RideStatus::Accepted;
            },
        )
    }

    /// `accepted` → `started`, gated on the assigned driver and the current
    /// OTP. Rotates the OTP so the accept-time code cannot complete the
    /// ride.
    pub fn start(&self, id: &Uuid, driver: Uuid, otp: u32, next_otp: u32) -> Option<Ride> {
        self.update_if(
            id,
            |ride| {
                ride.status == RideStatus::Accepted
                    && ride.driver == Some(driver)
                    && ride.otp == Some(otp)
            },
            |ride| {
                ride.otp = Some(next_otp);
                ride.status = RideStatus::Started;
            },
        )
    }

    /// `started` → `completed`, gated like `start`; clears the OTP.
    pub fn complete(&self, id: &Uuid, driver: Uuid, otp: u32) -> Option<Ride> {
        self.update_if(
            id,
            |ride| {
                ride.status == RideStatus::Started
                    && ride.driver == Some(driver)
                    && ride.otp == Some(otp)
            },
            |ride| {
                ride.otp = None;
                ride.status = RideStatus::Completed;
            },
        )
    }

    /// Riders may cancel before or after assignment; drivers only rides
    /// assigned to them that have not started.
    pub fn cancel(&self, id: &Uuid, actor: CancelActor, actor_id: Uuid) -> Option<Ride> {
        self.update_if(
            id,
            |ride| match actor {
                CancelActor::Rider => {
                    ride.rider == actor_id
                        && matches!(ride.status, RideStatus::Processing | RideStatus::Accepted)
                }
                CancelActor::Driver => {
                    ride.status == RideStatus::Accepted && ride.driver == Some(actor_id)
                }
            },
            |ride| {
                ride.cancelled_by = Some(actor);
                ride.otp = None;
                ride.status = RideStatus::Cancelled;
            },
        )
    }

    /// Raises `sent_to_radius` to the next tier. Guarded on the tier the
    /// caller observed, so overlapping sweep ticks cannot escalate twice.
    pub fn escalate(&self, id: &Uuid, from_radius_km: f64, to_radius_km: f64) -> Option<Ride> {
        self.update_if(
            id,
            |ride| ride.status == RideStatus::Processing && ride.sent_to_radius == from_radius_km,
            |ride| {
                ride.sent_to_radius = to_radius_km;
            },
        )
    }

    /// `processing` → `terminated`, for rides that went stale at the last
    /// tier.
    pub fn terminate(&self, id: &Uuid) -> Option<Ride> {
        self.update_if(
            id,
            |ride| ride.status == RideStatus::Processing,
            |ride| {
                ride.status = RideStatus::Terminated;
            },
        )
    }

    /// `processing` → `failed`, when dispatch finds no candidates at any
    /// tier after payment already went through.
    pub fn fail(&self, id: &Uuid) -> Option<Ride> {
        self.update_if(
            id,
            |ride| ride.status == RideStatus::Processing,
            |ride| {
                ride.status = RideStatus::Failed;
            },
        )
    }

    /// Unmatched rides whose last update is older than the cutoff. The
    /// sweeper re-checks tier state through the conditional updates above,
    /// so this read does not need to be consistent with them.
    pub fn stale_processing(&self, cutoff: DateTime<Utc>) -> Vec<Ride> {
        self.rides
            .iter()
            .filter(|entry| {
                let ride = entry.value();
                ride.status == RideStatus::Processing && ride.updated_at <= cutoff
            })
            .map(|entry| entry.value().clone())
            .collect()
    }
}
