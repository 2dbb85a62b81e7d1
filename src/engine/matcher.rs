use crate::geo::{self, GeoPoint};
use crate::models::driver::Driver;
use crate::models::ride::VehicleType;
use crate::store::drivers::DriverDirectory;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub driver: Driver,
    pub distance_km: f64,
}

/// Drivers with a matching vehicle type within `radius_km` of the pickup,
/// nearest first. An empty result is not an error; callers escalate or
/// fail.
pub fn find(
    directory: &DriverDirectory,
    pickup: &GeoPoint,
    radius_km: f64,
    vehicle_type: VehicleType,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    directory.for_each(|driver| {
        if driver.vehicle.vehicle_type != vehicle_type {
            return;
        }

        let distance_km = geo::haversine_km(&driver.location, pickup);
        if distance_km <= radius_km {
            candidates.push(Candidate {
                driver: driver.clone(),
                distance_km,
            });
        }
    });

    candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    candidates
}

/// Walks the radius tiers in order and returns the first tier that yields
/// candidates, together with them.
pub fn find_with_escalation(
    directory: &DriverDirectory,
    pickup: &GeoPoint,
    tiers: &[f64],
    vehicle_type: VehicleType,
) -> Option<(f64, Vec<Candidate>)> {
    for &tier in tiers {
        let candidates = find(directory, pickup, tier, vehicle_type);
        if !candidates.is_empty() {
            return Some((tier, candidates));
        }
    }

    None
}
