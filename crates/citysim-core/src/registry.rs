//! The per-city car registry.
//!
//! Cars are shared between the scheduler (each leader task locks its
//! leader for the whole tick and then each follower in turn) and the API
//! (car creation and listing). The registry map has its own lock; a caller
//! must never hold the map lock while waiting on a car lock that a tick
//! may hold, see [`crate::city::City::start_new_cars`].

use std::collections::BTreeMap;
use std::sync::Arc;

use citysim_types::CarId;
use tokio::sync::{Mutex, RwLock};

use crate::car::Car;

/// A car record shared between the registry and the scheduler.
pub type SharedCar = Arc<Mutex<Car>>;

/// Identifier-keyed map of every car in a city.
#[derive(Debug, Default)]
pub struct CarRegistry {
    cars: RwLock<BTreeMap<CarId, SharedCar>>,
}

impl CarRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a car.
    pub async fn get(&self, id: &CarId) -> Option<SharedCar> {
        self.cars.read().await.get(id).cloned()
    }

    /// Insert a car unless its VIN is already registered.
    ///
    /// On a clash the car is handed back untouched.
    pub async fn insert(&self, car: Car) -> Result<SharedCar, Car> {
        let mut cars = self.cars.write().await;
        if cars.contains_key(&car.vin) {
            return Err(car);
        }
        let id = car.vin.clone();
        let shared = Arc::new(Mutex::new(car));
        cars.insert(id, Arc::clone(&shared));
        Ok(shared)
    }

    /// Number of registered cars.
    pub async fn len(&self) -> usize {
        self.cars.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.cars.read().await.is_empty()
    }

    /// Point-in-time copy of every car, ordered by VIN.
    pub async fn snapshot(&self) -> Vec<Car> {
        let handles: Vec<SharedCar> = self.cars.read().await.values().cloned().collect();
        let mut cars = Vec::with_capacity(handles.len());
        for handle in handles {
            cars.push(handle.lock().await.clone());
        }
        cars
    }

    /// Drop every car. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut cars = self.cars.write().await;
        let removed = cars.len();
        cars.clear();
        removed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use citysim_types::{CityId, Position};

    use super::*;

    fn car(vin: &str) -> Car {
        Car::new(
            CarId::new(vin),
            String::from("AA-001-AA"),
            CityId::new("pentos"),
            None,
            Position::new(0, 0),
        )
    }

    #[tokio::test]
    async fn duplicate_vin_is_handed_back() {
        let registry = CarRegistry::new();
        assert!(registry.insert(car("A")).await.is_ok());
        let clash = registry.insert(car("A")).await;
        assert!(clash.is_err());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn snapshot_reflects_mutations() {
        let registry = CarRegistry::new();
        let shared = registry.insert(car("B")).await.ok();
        if let Some(shared) = shared {
            shared.lock().await.position = Position::new(1, 1);
        }
        let cars = registry.snapshot().await;
        assert_eq!(cars.first().map(|c| c.position), Some(Position::new(1, 1)));
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let registry = CarRegistry::new();
        registry.insert(car("A")).await.ok();
        registry.insert(car("B")).await.ok();
        assert_eq!(registry.clear().await, 2);
        assert!(registry.is_empty().await);
        assert!(registry.get(&CarId::new("A")).await.is_none());
    }
}
