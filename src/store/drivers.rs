use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::driver::Driver;

/// Driver profiles with their last reported location. Locations are
/// updated out-of-band (REST/gRPC); the matcher only reads this directory.
#[derive(Default)]
pub struct DriverDirectory {
    drivers: DashMap<Uuid, Driver>,
}

impl DriverDirectory {
    pub fn new() -> Self {
        Self {
            drivers: DashMap::new(),
        }
    }

    pub fn insert(&self, driver: Driver) {
        self.drivers.insert(driver.id, driver);
    }

    pub fn get(&self, id: &Uuid) -> Option<Driver> {
        self.drivers.get(id).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<Driver> {
        self.drivers.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn update_location(&self, id: &Uuid, location: GeoPoint) -> Option<Driver> {
        let mut entry = self.drivers.get_mut(id)?;
        let driver = entry.value_mut();
        driver.location = location;
        driver.updated_at = Utc::now();
        Some(driver.clone())
    }

    pub fn for_each(&self, mut f: impl FnMut(&Driver)) {
        for entry in self.drivers.iter() {
            f(entry.value());
        }
    }
}
