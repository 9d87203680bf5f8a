//! A simulated city: grid, cars, topic, and lifecycle.
//!
//! ```text
//! Uninitialized --provision--> Provisioning --> Active --close--> Closing --> Closed
//!        ^                          |
//!        +------ broker error ------+
//! ```
//!
//! Cars can only be started while the city is `Active`. Closing stops the
//! scheduler, waits (bounded) for in-flight ticks, drops every car, and
//! releases the broker connection.

use std::sync::Arc;
use std::time::Duration;

use citysim_types::{CarId, CityId};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::broker::Broker;
use crate::car::Car;
use crate::config::{BrokerConfig, SimulationConfig};
use crate::error::CityError;
use crate::movement::Grid;
use crate::naming;
use crate::registry::CarRegistry;
use crate::scheduler::{Scheduler, TickContext};
use crate::telemetry::TelemetryEmitter;

/// Lifecycle state of a city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CityState {
    /// Created, topic not yet confirmed.
    Uninitialized,
    /// Topic check or creation in progress.
    Provisioning,
    /// Accepting cars, ticks running.
    Active,
    /// Draining in-flight ticks.
    Closing,
    /// Scheduler stopped, cars dropped, broker released.
    Closed,
}

impl CityState {
    /// Whether shutdown has started.
    pub const fn is_shutting_down(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

/// Everything needed to build a city besides its name and broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitySettings {
    /// Cells per side.
    pub size: u32,
    /// Period of every leader's tick.
    pub tick_interval: Duration,
    /// Topic detection events go to.
    pub topic_name: String,
    /// Partitions requested when the topic has to be created.
    pub topic_partitions: u32,
    /// Maximum ticks of this city in flight at once.
    pub worker_threads: usize,
    /// Bound on the drain performed by [`City::close`].
    pub shutdown_timeout: Duration,
    /// Seed for placement, identifiers, and movement.
    pub seed: Option<u64>,
}

impl CitySettings {
    /// Settings for a city of `size` from the loaded configuration.
    pub fn from_config(size: u32, simulation: &SimulationConfig, broker: &BrokerConfig) -> Self {
        Self {
            size,
            tick_interval: simulation.tick_interval(),
            topic_name: broker.topic_name.clone(),
            topic_partitions: broker.topic_partitions,
            worker_threads: simulation.worker_threads,
            shutdown_timeout: simulation.shutdown_timeout(),
            seed: simulation.seed,
        }
    }
}

/// The public description of a city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityInfo {
    /// Slug of the name.
    pub id: CityId,
    /// Display name.
    pub name: String,
    /// Cells per side.
    pub size: u32,
    /// Seconds between ticks of a car.
    pub tick_interval_seconds: u64,
    /// Topic detection events go to.
    pub topic_name: String,
}

/// What [`City::close`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ShutdownReport {
    /// Leader tasks stopped.
    pub leaders: usize,
    /// Cars dropped from the registry.
    pub cars: usize,
    /// Whether the drain hit its deadline.
    pub timed_out: bool,
}

/// A simulated city.
#[derive(Debug)]
pub struct City {
    info: CityInfo,
    grid: Grid,
    topic_partitions: u32,
    shutdown_timeout: Duration,
    state: RwLock<CityState>,
    broker: Option<Arc<dyn Broker>>,
    registry: Arc<CarRegistry>,
    emitter: Arc<TelemetryEmitter>,
    scheduler: Scheduler,
    context: Arc<TickContext>,
    rng: Mutex<SmallRng>,
}

impl City {
    /// Build a city. It starts `Uninitialized`; call [`City::provision`]
    /// before starting cars.
    ///
    /// # Errors
    ///
    /// Returns [`CityError::InvalidSettings`] if the grid is smaller than
    /// two cells per side or the tick interval is zero.
    pub fn new(name: String, settings: CitySettings, broker: Option<Arc<dyn Broker>>) -> Result<Self, CityError> {
        let grid = Grid::new(settings.size).ok_or_else(|| {
            CityError::InvalidSettings(format!(
                "size must be at least {}, got {}",
                Grid::MIN_SIZE,
                settings.size
            ))
        })?;
        if settings.tick_interval.is_zero() {
            return Err(CityError::InvalidSettings(String::from("tick interval must be positive")));
        }

        let id = CityId::from_name(&name);
        let registry = Arc::new(CarRegistry::new());
        let emitter = Arc::new(TelemetryEmitter::new(
            id.clone(),
            name.clone(),
            settings.topic_name.clone(),
            broker.clone(),
        ));
        let context = Arc::new(TickContext {
            grid,
            registry: Arc::clone(&registry),
            emitter: Arc::clone(&emitter),
        });
        let rng = settings
            .seed
            .map_or_else(|| SmallRng::from_rng(&mut rand::rng()), SmallRng::seed_from_u64);

        Ok(Self {
            info: CityInfo {
                id,
                name,
                size: settings.size,
                tick_interval_seconds: settings.tick_interval.as_secs(),
                topic_name: settings.topic_name,
            },
            grid,
            topic_partitions: settings.topic_partitions,
            shutdown_timeout: settings.shutdown_timeout,
            state: RwLock::new(CityState::Uninitialized),
            broker,
            registry,
            emitter,
            scheduler: Scheduler::new(settings.tick_interval, settings.worker_threads),
            context,
            rng: Mutex::new(rng),
        })
    }

    /// Public description.
    pub const fn info(&self) -> &CityInfo {
        &self.info
    }

    /// City id.
    pub const fn id(&self) -> &CityId {
        &self.info.id
    }

    /// Grid bounds.
    pub const fn grid(&self) -> Grid {
        self.grid
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> CityState {
        *self.state.read().await
    }

    /// Make sure the topic exists, creating it if needed, and activate the
    /// city.
    ///
    /// Safe to call again: an existing topic is never recreated. Without a
    /// broker there is nothing to provision and the city goes straight to
    /// `Active`.
    ///
    /// # Errors
    ///
    /// Returns [`CityError::Broker`] if the topic cannot be checked or
    /// created (the city falls back to its previous state), or
    /// [`CityError::NotActive`] once the city is closing.
    pub async fn provision(&self) -> Result<(), CityError> {
        let mut state = self.state.write().await;
        if state.is_shutting_down() {
            return Err(CityError::NotActive(self.info.id.clone()));
        }
        let previous = *state;
        *state = CityState::Provisioning;

        match self.ensure_topic().await {
            Ok(()) => {
                *state = CityState::Active;
                info!(city = %self.info.id, size = self.info.size, topic = %self.info.topic_name, "city active");
                Ok(())
            }
            Err(e) => {
                *state = previous;
                warn!(city = %self.info.id, error = %e, "topic provisioning failed");
                Err(e.into())
            }
        }
    }

    async fn ensure_topic(&self) -> Result<(), crate::broker::BrokerError> {
        let Some(broker) = &self.broker else {
            return Ok(());
        };
        let topic = &self.info.topic_name;
        if broker.topic_exists(topic).await? {
            return Ok(());
        }
        info!(topic = %topic, partitions = self.topic_partitions, "creating topic");
        if let Err(e) = broker.create_topic(topic, self.topic_partitions).await {
            // Another city may have created it in the meantime.
            if broker.topic_exists(topic).await? {
                return Ok(());
            }
            return Err(e);
        }
        Ok(())
    }

    /// Start `count` new cars.
    ///
    /// With `leader` set, every new car follows that car and gets no task
    /// of its own; otherwise every new car is a leader with its own
    /// periodic tick. Each car starts on a uniformly random cell.
    ///
    /// # Errors
    ///
    /// Returns [`CityError::CarNotFound`] if `leader` is not in the city
    /// (nothing is created), or [`CityError::NotActive`] if the city is not
    /// active.
    pub async fn start_new_cars(&self, leader: Option<&CarId>, count: usize) -> Result<Vec<Car>, CityError> {
        let state = self.state.read().await;
        if *state != CityState::Active {
            return Err(CityError::NotActive(self.info.id.clone()));
        }

        let leader = match leader {
            Some(id) => Some((
                id.clone(),
                self.registry
                    .get(id)
                    .await
                    .ok_or_else(|| CityError::CarNotFound(id.clone()))?,
            )),
            None => None,
        };

        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            let (shared, car, task_rng) = {
                let mut rng = self.rng.lock().await;
                let mut candidate = Car::new(
                    CarId::new(naming::vin(&mut *rng)),
                    naming::license_plate(&mut *rng),
                    self.info.id.clone(),
                    leader.as_ref().map(|(id, _)| id.clone()),
                    self.grid.random_position(&mut *rng),
                );
                let shared = loop {
                    match self.registry.insert(candidate).await {
                        Ok(shared) => break shared,
                        Err(clash) => {
                            candidate = clash;
                            candidate.vin = CarId::new(naming::vin(&mut *rng));
                        }
                    }
                };
                let car = shared.lock().await.clone();
                (shared, car, SmallRng::from_rng(&mut *rng))
            };

            info!(
                city = %self.info.id,
                vin = %car.vin,
                plate = %car.license_plate,
                position = %car.position,
                leader = car.leader_id.as_ref().map(CarId::as_str),
                "new car added to city"
            );

            match &leader {
                Some((_, leader_car)) => {
                    leader_car.lock().await.attach_follower(car.vin.clone());
                }
                None => {
                    self.scheduler
                        .register(shared, Arc::clone(&self.context), task_rng)
                        .await;
                }
            }
            created.push(car);
        }
        drop(state);

        Ok(created)
    }

    /// Snapshot of every car in the city.
    pub async fn cars(&self) -> Vec<Car> {
        self.registry.snapshot().await
    }

    /// Number of cars in the city.
    pub async fn car_count(&self) -> usize {
        self.registry.len().await
    }

    /// Number of leaders with a running task.
    pub async fn leader_count(&self) -> usize {
        self.scheduler.task_count().await
    }

    /// Stop the simulation and release every resource.
    ///
    /// Waits for in-flight ticks at most the configured shutdown timeout;
    /// on expiry the remaining ticks are aborted and teardown continues.
    /// Publishes already started get the same bound to land before the
    /// broker is flushed and released.
    /// A second call returns an empty report.
    pub async fn close(&self) -> ShutdownReport {
        {
            let mut state = self.state.write().await;
            if state.is_shutting_down() {
                return ShutdownReport::default();
            }
            *state = CityState::Closing;
        }
        info!(city = %self.info.id, "waiting for scheduled ticks to finish");

        let drain = self.scheduler.shutdown(self.shutdown_timeout).await;
        if drain.timed_out {
            warn!(
                city = %self.info.id,
                timeout_ms = self.shutdown_timeout.as_millis(),
                "shutdown timed out, tearing down with ticks still in flight"
            );
        }
        let cars = self.registry.clear().await;
        self.emitter.release(self.shutdown_timeout).await;

        *self.state.write().await = CityState::Closed;
        info!(city = %self.info.id, leaders = drain.tasks, cars, "city closed");

        ShutdownReport {
            leaders: drain.tasks,
            cars,
            timed_out: drain.timed_out,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use citysim_types::Position;

    use super::*;
    use crate::broker::MemoryBroker;

    fn settings(size: u32) -> CitySettings {
        CitySettings {
            size,
            tick_interval: Duration::from_millis(10),
            topic_name: String::from("car-detected"),
            topic_partitions: 3,
            worker_threads: 4,
            shutdown_timeout: Duration::from_secs(1),
            seed: Some(42),
        }
    }

    async fn active_city(size: u32, broker: &Arc<MemoryBroker>) -> City {
        let city = City::new(
            String::from("Kings Landing"),
            settings(size),
            Some(Arc::clone(broker) as Arc<dyn Broker>),
        )
        .unwrap();
        city.provision().await.unwrap();
        city
    }

    async fn wait_for_records(broker: &MemoryBroker, count: usize) -> usize {
        for _ in 0..200 {
            let n = broker.record_count().await;
            if n >= count {
                return n;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        broker.record_count().await
    }

    #[test]
    fn rejects_degenerate_settings() {
        assert!(matches!(
            City::new(String::from("Lys"), settings(1), None),
            Err(CityError::InvalidSettings(_))
        ));
        let mut zero_tick = settings(5);
        zero_tick.tick_interval = Duration::ZERO;
        assert!(matches!(
            City::new(String::from("Lys"), zero_tick, None),
            Err(CityError::InvalidSettings(_))
        ));
    }

    #[test]
    fn id_is_derived_from_name() {
        let city = City::new(String::from("Kings Landing"), settings(5), None);
        assert_eq!(city.map(|c| c.id().clone()).ok(), Some(CityId::new("kings_landing")));
    }

    #[tokio::test]
    async fn provisioning_twice_creates_the_topic_once() {
        let broker = Arc::new(MemoryBroker::new());
        let city = active_city(5, &broker).await;

        assert!(city.provision().await.is_ok());
        assert_eq!(broker.topic_creations().await, 1);
        assert_eq!(broker.partitions("car-detected").await, Some(3));
        assert_eq!(city.state().await, CityState::Active);
    }

    #[tokio::test]
    async fn provisioning_failure_leaves_city_inactive() {
        let broker = Arc::new(MemoryBroker::new());
        broker.fail_admin(true).await;
        let city = City::new(
            String::from("Lys"),
            settings(5),
            Some(Arc::clone(&broker) as Arc<dyn Broker>),
        )
        .unwrap();

        assert!(matches!(city.provision().await, Err(CityError::Broker { .. })));
        assert_eq!(city.state().await, CityState::Uninitialized);
        assert!(matches!(city.start_new_cars(None, 1).await, Err(CityError::NotActive(_))));
    }

    #[tokio::test]
    async fn without_broker_city_is_active_and_silent() {
        let city = City::new(String::from("Lys"), settings(5), None).unwrap();
        assert!(city.provision().await.is_ok());
        let cars = city.start_new_cars(None, 2).await.unwrap_or_default();
        assert_eq!(cars.len(), 2);
        city.close().await;
    }

    #[tokio::test]
    async fn unknown_leader_creates_nothing() {
        let broker = Arc::new(MemoryBroker::new());
        let city = active_city(5, &broker).await;
        city.start_new_cars(None, 2).await.ok();

        let result = city.start_new_cars(Some(&CarId::new("NOPE")), 3).await;

        assert!(matches!(result, Err(CityError::CarNotFound(_))));
        assert_eq!(city.car_count().await, 2);
        city.close().await;
    }

    #[tokio::test]
    async fn leaders_get_tasks_and_followers_attach() {
        let broker = Arc::new(MemoryBroker::new());
        let city = active_city(8, &broker).await;

        let leaders = city.start_new_cars(None, 2).await.unwrap_or_default();
        assert_eq!(leaders.len(), 2);
        assert!(leaders.iter().all(Car::is_leader));
        let leader_vin = leaders.first().map(|c| c.vin.clone()).unwrap();

        let followers = city.start_new_cars(Some(&leader_vin), 3).await.unwrap_or_default();
        assert_eq!(followers.len(), 3);
        assert!(followers.iter().all(|c| c.leader_id.as_ref() == Some(&leader_vin)));

        assert_eq!(city.car_count().await, 5);
        assert_eq!(city.leader_count().await, 2);

        let cars = city.cars().await;
        let leader = cars.iter().find(|c| c.vin == leader_vin);
        assert_eq!(leader.map(|c| c.followers.len()), Some(3));
        city.close().await;
    }

    #[tokio::test]
    async fn positions_stay_on_the_grid_while_running() {
        let broker = Arc::new(MemoryBroker::new());
        let city = active_city(3, &broker).await;
        let leaders = city.start_new_cars(None, 3).await.unwrap_or_default();
        for leader in &leaders {
            city.start_new_cars(Some(&leader.vin), 2).await.ok();
        }

        let target = wait_for_records(&broker, 90).await;
        assert!(target >= 90);

        for car in city.cars().await {
            assert!(city.grid().contains(car.position), "{} off grid at {}", car.vin, car.position);
            assert!(city.grid().contains(car.previous_position));
        }
        for record in broker.records().await {
            let event: Option<citysim_types::CarDetectedEvent> = serde_json::from_slice(&record.payload).ok();
            let event = event.unwrap();
            assert!(event.x < 3 && event.y < 3);
            assert_eq!(record.key, format!("kings_landing-{}-{}", event.x, event.y));
            assert_eq!(event.city, "Kings Landing");
        }
        city.close().await;
    }

    #[tokio::test]
    async fn close_stops_ticks_and_tears_down() {
        let broker = Arc::new(MemoryBroker::new());
        let city = active_city(6, &broker).await;
        let leaders = city.start_new_cars(None, 4).await.unwrap_or_default();
        if let Some(first) = leaders.first() {
            city.start_new_cars(Some(&first.vin), 2).await.ok();
        }
        wait_for_records(&broker, 8).await;

        let report = city.close().await;

        assert_eq!(report.leaders, 4);
        assert_eq!(report.cars, 6);
        assert!(!report.timed_out);
        assert_eq!(city.state().await, CityState::Closed);
        assert_eq!(city.car_count().await, 0);

        // Publishes in flight at close have landed; nothing arrives later.
        let settled = broker.record_count().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(broker.record_count().await, settled);

        assert!(matches!(city.start_new_cars(None, 1).await, Err(CityError::NotActive(_))));
        assert_eq!(city.close().await, ShutdownReport::default());
    }

    #[tokio::test]
    async fn seeded_cities_place_cars_identically() {
        let a = City::new(String::from("Lys"), settings(50), None).unwrap();
        let b = City::new(String::from("Lys"), settings(50), None).unwrap();
        a.provision().await.ok();
        b.provision().await.ok();

        let first: Vec<(CarId, Position)> = a
            .start_new_cars(None, 1)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|c| (c.vin, c.position))
            .collect();
        let second: Vec<(CarId, Position)> = b
            .start_new_cars(None, 1)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|c| (c.vin, c.position))
            .collect();

        assert_eq!(first, second);
        a.close().await;
        b.close().await;
    }
}
