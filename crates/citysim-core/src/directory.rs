//! The set of running cities.

use std::collections::BTreeMap;
use std::sync::Arc;

use citysim_types::{CarId, CityId};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::broker::Broker;
use crate::car::Car;
use crate::city::{City, CitySettings, ShutdownReport};
use crate::config::{BrokerConfig, SimulationConfig};
use crate::error::CityError;
use crate::naming::CityNames;

/// Owns every city of the process, keyed by id.
#[derive(Debug)]
pub struct CityDirectory {
    cities: RwLock<BTreeMap<CityId, Arc<City>>>,
    simulation: SimulationConfig,
    broker_config: BrokerConfig,
    broker: Option<Arc<dyn Broker>>,
    names: Mutex<(CityNames, SmallRng)>,
}

impl CityDirectory {
    /// Empty directory. Cities created through it share `broker`.
    pub fn new(simulation: SimulationConfig, broker_config: BrokerConfig, broker: Option<Arc<dyn Broker>>) -> Self {
        let rng = simulation
            .seed
            .map_or_else(|| SmallRng::from_rng(&mut rand::rng()), SmallRng::seed_from_u64);
        Self {
            cities: RwLock::new(BTreeMap::new()),
            simulation,
            broker_config,
            broker,
            names: Mutex::new((CityNames::new(), rng)),
        }
    }

    /// Create, provision, and register a new city with a generated name.
    ///
    /// # Errors
    ///
    /// Returns [`CityError::InvalidSettings`] for a size below two and
    /// [`CityError::Broker`] if the topic cannot be provisioned. Nothing
    /// is registered on failure.
    pub async fn create_city(&self, size: Option<u32>) -> Result<Arc<City>, CityError> {
        let size = size.unwrap_or(self.simulation.default_city_size);
        let mut settings = CitySettings::from_config(size, &self.simulation, &self.broker_config);

        let name = {
            let mut guard = self.names.lock().await;
            let (names, rng) = &mut *guard;
            if settings.seed.is_some() {
                settings.seed = Some(rng.random());
            }
            names.next(rng)
        };

        let city = Arc::new(City::new(name, settings, self.broker.clone())?);
        city.provision().await?;

        self.cities
            .write()
            .await
            .insert(city.id().clone(), Arc::clone(&city));
        info!(city = %city.id(), size, "city created");
        Ok(city)
    }

    /// Every city, ordered by id.
    pub async fn list_cities(&self) -> Vec<Arc<City>> {
        self.cities.read().await.values().cloned().collect()
    }

    /// Look up a city.
    ///
    /// # Errors
    ///
    /// Returns [`CityError::CityNotFound`] for an unknown id.
    pub async fn get_city(&self, id: &CityId) -> Result<Arc<City>, CityError> {
        self.cities
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CityError::CityNotFound(id.clone()))
    }

    /// Remove a city and shut it down.
    ///
    /// # Errors
    ///
    /// Returns [`CityError::CityNotFound`] for an unknown id.
    pub async fn delete_city(&self, id: &CityId) -> Result<ShutdownReport, CityError> {
        let city = self
            .cities
            .write()
            .await
            .remove(id)
            .ok_or_else(|| CityError::CityNotFound(id.clone()))?;
        Ok(city.close().await)
    }

    /// Start cars in a city. See [`City::start_new_cars`].
    ///
    /// # Errors
    ///
    /// Returns [`CityError::CityNotFound`] for an unknown city, otherwise
    /// whatever the city reports.
    pub async fn start_cars(&self, id: &CityId, leader: Option<&CarId>, count: usize) -> Result<Vec<Car>, CityError> {
        self.get_city(id).await?.start_new_cars(leader, count).await
    }

    /// Snapshot of the cars of a city.
    ///
    /// # Errors
    ///
    /// Returns [`CityError::CityNotFound`] for an unknown city.
    pub async fn list_cars(&self, id: &CityId) -> Result<Vec<Car>, CityError> {
        Ok(self.get_city(id).await?.cars().await)
    }

    /// Number of registered cities.
    pub async fn len(&self) -> usize {
        self.cities.read().await.len()
    }

    /// Whether no city is registered.
    pub async fn is_empty(&self) -> bool {
        self.cities.read().await.is_empty()
    }

    /// Remove and shut down every city, returning how many were closed.
    pub async fn close_all(&self) -> usize {
        let cities = std::mem::take(&mut *self.cities.write().await);
        let count = cities.len();
        for (id, city) in cities {
            let report = city.close().await;
            info!(city = %id, leaders = report.leaders, timed_out = report.timed_out, "city shut down");
        }
        count
    }
}
