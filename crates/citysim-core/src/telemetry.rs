//! Telemetry emission.
//!
//! Every move of every car becomes a [`CarDetectedEvent`] published to the
//! city's topic, keyed by the sensor id of the cell. Delivery is
//! best-effort: the publish runs on its own task, its outcome is only
//! logged, and a tick never waits for it. In-flight publishes are tracked
//! so [`TelemetryEmitter::release`] can let them land before flushing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use citysim_types::{CarDetectedEvent, CityId};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::broker::Broker;
use crate::car::Car;

/// Build the detection event for `car` at its current position.
pub fn detect(car: &Car, city_id: &CityId, city_name: &str, at: DateTime<Utc>) -> CarDetectedEvent {
    CarDetectedEvent {
        sensor_id: CarDetectedEvent::sensor_id_for(city_id, car.position),
        vin: car.vin.clone(),
        license_plate: car.license_plate.clone(),
        city: city_name.to_owned(),
        x: car.position.x,
        y: car.position.y,
        timestamp: at,
    }
}

/// Publishes detection events for one city.
#[derive(Debug)]
pub struct TelemetryEmitter {
    city_id: CityId,
    city_name: String,
    topic: String,
    broker: RwLock<Option<Arc<dyn Broker>>>,
    inflight: Mutex<JoinSet<()>>,
}

impl TelemetryEmitter {
    /// Create an emitter for a city. With `broker` set to `None` every
    /// emission is a silent no-op.
    pub fn new(
        city_id: CityId,
        city_name: String,
        topic: String,
        broker: Option<Arc<dyn Broker>>,
    ) -> Self {
        Self {
            city_id,
            city_name,
            topic,
            broker: RwLock::new(broker),
            inflight: Mutex::new(JoinSet::new()),
        }
    }

    /// Whether a broker connection is still held.
    pub async fn is_connected(&self) -> bool {
        self.broker.read().await.is_some()
    }

    /// Number of publishes started and not yet reaped.
    pub async fn inflight(&self) -> usize {
        self.inflight.lock().await.len()
    }

    /// Publish the car's current position.
    ///
    /// Returns `false` when nothing was sent (no broker, or the event could
    /// not be encoded).
    pub async fn emit(&self, car: &Car) -> bool {
        // Held until the publish is tracked, so release() cannot slip in
        // between taking the handle and registering the task.
        let broker_guard = self.broker.read().await;
        let Some(broker) = broker_guard.clone() else {
            return false;
        };

        let event = detect(car, &self.city_id, &self.city_name, Utc::now());
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(vin = %car.vin, error = %e, "failed to encode detection event");
                return false;
            }
        };

        let topic = self.topic.clone();
        let plate = car.license_plate.clone();
        let position = car.position;
        let mut inflight = self.inflight.lock().await;
        while inflight.try_join_next().is_some() {}
        inflight.spawn(async move {
            match broker.publish(&topic, &event.sensor_id, payload).await {
                Ok(()) => debug!(plate = %plate, %position, "car detected at position"),
                Err(e) => error!(topic = %topic, sensor_id = %event.sensor_id, error = %e, "failed to publish detection event"),
            }
        });
        drop(broker_guard);
        true
    }

    /// Wait at most `timeout` for in-flight publishes to finish. Returns how
    /// many were still running at the deadline; those are aborted.
    pub async fn settle(&self, timeout: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.inflight.lock().await);
        let drained = tokio::time::timeout(timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_ok() {
            return 0;
        }
        let abandoned = tasks.len();
        warn!(topic = %self.topic, abandoned, "in-flight publishes did not finish in time");
        tasks.abort_all();
        abandoned
    }

    /// Stop emitting, let in-flight publishes land (bounded by `timeout`),
    /// flush, and let go of the broker connection.
    ///
    /// Later emissions become no-ops. Calling this twice is harmless.
    pub async fn release(&self, timeout: Duration) {
        let Some(broker) = self.broker.write().await.take() else {
            return;
        };
        self.settle(timeout).await;
        if let Err(e) = broker.flush().await {
            warn!(topic = %self.topic, error = %e, "flush on release failed");
        }
        info!(city = %self.city_id, "broker connection released");
    }
}
