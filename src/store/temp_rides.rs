use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;

use crate::models::ride::TemporaryRide;

/// Provisional bookings keyed by payment session id. Entries older than
/// the TTL count as abandoned: they are skipped on take and evicted by the
/// sweeper tick.
pub struct TempRideStore {
    entries: DashMap<String, TemporaryRide>,
    ttl: ChronoDuration,
}

impl TempRideStore {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::hours(24)),
        }
    }

    pub fn insert(&self, temp: TemporaryRide) {
        self.entries.insert(temp.payment_session_id.clone(), temp);
    }

    /// Removes and returns the booking for a session, unless it expired.
    pub fn take(&self, session_id: &str) -> Option<TemporaryRide> {
        let (_, temp) = self.entries.remove(session_id)?;

        if self.expired(&temp, Utc::now()) {
            return None;
        }

        Some(temp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, temp| !self.expired(temp, now));
        before - self.entries.len()
    }

    fn expired(&self, temp: &TemporaryRide, now: DateTime<Utc>) -> bool {
        now - temp.created_at > self.ttl
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{Duration as ChronoDuration, Utc};
    use uuid::Uuid;

    use super::TempRideStore;
    use crate::geo::GeoPoint;
    use crate::models::ride::{TemporaryRide, VehicleType};

    fn temp_ride(session: &str) -> TemporaryRide {
        TemporaryRide {
            id: Uuid::new_v4(),
            rider: Uuid::new_v4(),
            pickup: GeoPoint { lat: 30.7, lng: 76.7 },
            dropoff: GeoPoint { lat: 30.8, lng: 76.8 },
            vehicle_type: VehicleType::Car,
            distance_km: 3.2,
            fare: 52,
            charged_total: 62,
            payment_session_id: session.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn take_removes_the_booking() {
        let store = TempRideStore::new(Duration::from_secs(60));
        store.insert(temp_ride("cs_1"));

        assert!(store.take("cs_1").is_some());
        assert!(store.take("cs_1").is_none());
    }

    #[test]
    fn expired_bookings_are_not_returned() {
        let store = TempRideStore::new(Duration::from_secs(60));
        let mut temp = temp_ride("cs_2");
        temp.created_at = Utc::now() - ChronoDuration::seconds(120);
        store.insert(temp);

        assert!(store.take("cs_2").is_none());
    }

    #[test]
    fn evict_expired_drops_only_old_entries() {
        let store = TempRideStore::new(Duration::from_secs(60));
        store.insert(temp_ride("fresh"));
        let mut old = temp_ride("stale");
        old.created_at = Utc::now() - ChronoDuration::seconds(120);
        store.insert(old);

        assert_eq!(store.evict_expired(Utc::now()), 1);
        assert_eq!(store.len(), 1);
        assert!(store.take("fresh").is_some());
    }
}
