//! Message broker seam.
//!
//! The simulation only needs four things from a broker: check whether a
//! topic exists, create it, publish a keyed record, and flush pending
//! records on shutdown. [`Broker`] captures exactly that so the engine can
//! run against NATS `JetStream` in production and against
//! [`MemoryBroker`] in tests and broker-less local runs.

mod memory;

pub use memory::{MemoryBroker, PublishedRecord};

use async_trait::async_trait;

/// Errors reported by a broker implementation.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker could not be reached.
    #[error("broker connection failed: {0}")]
    Connection(String),

    /// Listing or creating a topic failed.
    #[error("topic administration failed for {topic}: {message}")]
    Topic {
        /// The topic being checked or created.
        topic: String,
        /// Description of the failure.
        message: String,
    },

    /// The broker did not accept a record.
    #[error("publish to {topic} failed: {message}")]
    Publish {
        /// Destination topic.
        topic: String,
        /// Description of the failure.
        message: String,
    },

    /// Flushing buffered records failed.
    #[error("flush failed: {0}")]
    Flush(String),
}

/// A keyed-record message broker.
///
/// Implementations must be cheap to share: a city clones the handle into
/// every emitter and the emitter publishes from detached tasks.
#[async_trait]
pub trait Broker: Send + Sync + core::fmt::Debug {
    /// Whether `topic` already exists on the broker.
    async fn topic_exists(&self, topic: &str) -> Result<bool, BrokerError>;

    /// Create `topic` with the given partition count.
    async fn create_topic(&self, topic: &str, partitions: u32) -> Result<(), BrokerError>;

    /// Publish `payload` to `topic` under `key`.
    ///
    /// Resolves once the broker has acknowledged (or refused) the record.
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Push out anything still buffered client-side.
    async fn flush(&self) -> Result<(), BrokerError>;
}
