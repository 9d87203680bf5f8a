//! Core of the city traffic simulator.
//!
//! A [`City`] is a square grid of cells with cars on it. Leader cars walk
//! the grid on a fixed tick; follower cars trail a leader one cell behind.
//! Every move is published as a
//! [`CarDetectedEvent`](citysim_types::CarDetectedEvent) through a
//! [`Broker`]. The [`CityDirectory`] owns every city of the process.

pub mod broker;
pub mod car;
pub mod city;
pub mod config;
pub mod directory;
pub mod error;
pub mod movement;
pub mod naming;
pub mod registry;
pub mod scheduler;
pub mod telemetry;

pub use broker::{Broker, BrokerError, MemoryBroker};
pub use car::Car;
pub use city::{City, CityInfo, CitySettings, CityState, ShutdownReport};
pub use config::{BrokerConfig, BrokerKind, CitysimConfig, ConfigError, SimulationConfig};
pub use directory::CityDirectory;
pub use error::CityError;
pub use movement::Grid;
