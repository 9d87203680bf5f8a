//! City traffic simulator binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `citysim.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to the configured message broker
//! 4. Build the city directory
//! 5. Serve the HTTP API until `Ctrl-C`
//! 6. Close every city, draining in-flight ticks

mod error;
mod nats;

use std::path::Path;
use std::sync::Arc;

use citysim_api::AppState;
use citysim_core::{Broker, BrokerConfig, BrokerKind, CityDirectory, CitysimConfig, MemoryBroker};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::nats::NatsBroker;

const CONFIG_PATH: &str = "citysim.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, broker connection, or the HTTP
/// server fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let config = load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        default_city_size = config.simulation.default_city_size,
        tick_interval_seconds = config.simulation.tick_interval_seconds,
        worker_threads = config.simulation.worker_threads,
        topic = %config.broker.topic_name,
        "citysim-engine starting"
    );

    let broker = connect_broker(&config.broker).await?;
    let directory = Arc::new(CityDirectory::new(
        config.simulation.clone(),
        config.broker.clone(),
        broker,
    ));
    let state = Arc::new(AppState::new(Arc::clone(&directory)));

    citysim_api::start_server(&config.server, state, shutdown_signal()).await?;

    let closed = directory.close_all().await;
    info!(cities = closed, "citysim-engine stopped");
    Ok(())
}

/// Load configuration from `citysim.yaml`, then apply environment
/// overrides.
fn load_config() -> Result<CitysimConfig, EngineError> {
    let path = Path::new(CONFIG_PATH);
    let mut config = if path.exists() {
        CitysimConfig::from_file(path)?
    } else {
        CitysimConfig::default()
    };
    config.apply_env_overrides();
    Ok(config)
}

async fn connect_broker(config: &BrokerConfig) -> Result<Option<Arc<dyn Broker>>, EngineError> {
    let broker: Option<Arc<dyn Broker>> = match config.kind {
        BrokerKind::Nats => Some(Arc::new(
            NatsBroker::connect(&config.nats_url, config.topic_partitions).await?,
        )),
        BrokerKind::Memory => {
            info!("using in-memory broker, telemetry stays in process");
            Some(Arc::new(MemoryBroker::new()))
        }
        BrokerKind::None => {
            warn!("no broker configured, telemetry is dropped");
            None
        }
    };
    Ok(broker)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received, closing cities");
}
