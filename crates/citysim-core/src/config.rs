//! Configuration loading and typed config structures.
//!
//! The configuration lives in `citysim.yaml` in the working directory.
//! Every field has a default, so a missing file, an empty file, or a file
//! that sets a single key are all valid.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CitysimConfig {
    /// City and scheduling parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Message broker connection and topic.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CitysimConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment overrides are not applied here, see
    /// [`CitysimConfig::apply_env_overrides`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml maps an empty document to unit, not to an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override connection settings with environment variables when set:
    /// `NATS_URL` replaces `broker.nats_url` and `CITYSIM_PORT` replaces
    /// `server.port`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NATS_URL") {
            self.broker.nats_url = val;
        }
        if let Some(port) = std::env::var("CITYSIM_PORT").ok().and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
    }
}

/// City and scheduling parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Grid size used when a city is created without one.
    #[serde(default = "default_city_size")]
    pub default_city_size: u32,

    /// Seconds between two ticks of the same car.
    #[serde(default = "default_tick_interval_seconds")]
    pub tick_interval_seconds: u64,

    /// Maximum ticks of one city executing at the same time.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// How long deleting a city waits for in-flight ticks.
    #[serde(default = "default_shutdown_timeout_seconds")]
    pub shutdown_timeout_seconds: u64,

    /// Seed for placement and movement randomness. Unset means entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationConfig {
    /// Tick period as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    /// Shutdown drain bound as a [`Duration`].
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_city_size: default_city_size(),
            tick_interval_seconds: default_tick_interval_seconds(),
            worker_threads: default_worker_threads(),
            shutdown_timeout_seconds: default_shutdown_timeout_seconds(),
            seed: None,
        }
    }
}

/// Which broker implementation the engine connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// NATS `JetStream`.
    #[default]
    Nats,
    /// In-process broker; records are kept in memory.
    Memory,
    /// No broker; telemetry is dropped.
    None,
}

/// Message broker settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrokerConfig {
    /// Broker implementation.
    #[serde(default)]
    pub kind: BrokerKind,

    /// NATS server URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Topic detection events are published to.
    #[serde(default = "default_topic_name")]
    pub topic_name: String,

    /// Partitions created with the topic.
    #[serde(default = "default_topic_partitions")]
    pub topic_partitions: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::default(),
            nats_url: default_nats_url(),
            topic_name: default_topic_name(),
            topic_partitions: default_topic_partitions(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_city_size() -> u32 {
    10
}

const fn default_tick_interval_seconds() -> u64 {
    1
}

const fn default_worker_threads() -> usize {
    10
}

const fn default_shutdown_timeout_seconds() -> u64 {
    5
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_topic_name() -> String {
    "car-detected".to_owned()
}

const fn default_topic_partitions() -> u32 {
    1
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    7070
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CitysimConfig::default();
        assert_eq!(config.simulation.default_city_size, 10);
        assert_eq!(config.simulation.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.simulation.worker_threads, 10);
        assert_eq!(config.simulation.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.broker.kind, BrokerKind::Nats);
        assert_eq!(config.broker.topic_name, "car-detected");
        assert_eq!(config.broker.topic_partitions, 1);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
simulation:
  default_city_size: 25
  tick_interval_seconds: 2
  worker_threads: 4
  shutdown_timeout_seconds: 3
  seed: 99

broker:
  kind: memory
  nats_url: "nats://testhost:4222"
  topic_name: "detections"
  topic_partitions: 6

server:
  host: "127.0.0.1"
  port: 9090

logging:
  level: "debug"
"#;

        let config = CitysimConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.simulation.default_city_size, 25);
        assert_eq!(config.simulation.seed, Some(99));
        assert_eq!(config.broker.kind, BrokerKind::Memory);
        assert_eq!(config.broker.topic_name, "detections");
        assert_eq!(config.broker.topic_partitions, 6);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.level, "debug");
        // Parsing never consults the environment.
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.broker.nats_url, "nats://testhost:4222");
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "simulation:\n  default_city_size: 4\n";
        let config = CitysimConfig::parse(yaml).ok().unwrap_or_default();

        assert_eq!(config.simulation.default_city_size, 4);
        assert_eq!(config.simulation.tick_interval_seconds, 1);
        assert_eq!(config.broker.topic_name, "car-detected");
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(CitysimConfig::parse("").is_ok());
    }

    #[test]
    fn unknown_broker_kind_is_rejected() {
        assert!(CitysimConfig::parse("broker:\n  kind: kafka\n").is_err());
    }
}
