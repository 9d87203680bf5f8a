//! NATS `JetStream` implementation of the [`Broker`] seam.
//!
//! A topic is a `JetStream` stream of the same name capturing every
//! subject under `{topic}.>`. Records are spread over partition subjects
//! `{topic}.{p}` where `p` is the FNV-1a hash of the record key modulo the
//! partition count, so every record of one sensor lands on one subject.
//! The key itself travels in the `Sensor-Key` header.

use std::collections::BTreeMap;

use async_nats::jetstream;
use async_trait::async_trait;
use citysim_core::{Broker, BrokerError};
use futures::TryStreamExt as _;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Header carrying the record key.
pub const KEY_HEADER: &str = "Sensor-Key";

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Partition a key is published to.
///
/// With one partition (or none) everything goes to partition 0.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    if partitions <= 1 {
        return 0;
    }
    let hash = key
        .bytes()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME));
    hash.wrapping_rem(partitions)
}

/// Broker backed by a NATS server with `JetStream` enabled.
pub struct NatsBroker {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    default_partitions: u32,
    partitions: RwLock<BTreeMap<String, u32>>,
}

impl std::fmt::Debug for NatsBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBroker")
            .field("default_partitions", &self.default_partitions)
            .finish_non_exhaustive()
    }
}

impl NatsBroker {
    /// Connect to the NATS server at `url`.
    ///
    /// `default_partitions` is used for topics this broker did not create
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Connection`] if the server is unreachable.
    pub async fn connect(url: &str, default_partitions: u32) -> Result<Self, BrokerError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BrokerError::Connection(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");

        let jetstream = jetstream::new(client.clone());
        Ok(Self {
            client,
            jetstream,
            default_partitions: default_partitions.max(1),
            partitions: RwLock::new(BTreeMap::new()),
        })
    }

    async fn partitions_of(&self, topic: &str) -> u32 {
        self.partitions
            .read()
            .await
            .get(topic)
            .copied()
            .unwrap_or(self.default_partitions)
    }
}

#[async_trait]
impl Broker for NatsBroker {
    async fn topic_exists(&self, topic: &str) -> Result<bool, BrokerError> {
        let names: Vec<String> = self
            .jetstream
            .stream_names()
            .try_collect()
            .await
            .map_err(|e| BrokerError::Topic {
                topic: topic.to_owned(),
                message: format!("failed to list streams: {e}"),
            })?;
        Ok(names.iter().any(|name| name == topic))
    }

    async fn create_topic(&self, topic: &str, partitions: u32) -> Result<(), BrokerError> {
        let partitions = partitions.max(1);
        self.jetstream
            .create_stream(jetstream::stream::Config {
                name: topic.to_owned(),
                subjects: vec![format!("{topic}.>")],
                ..Default::default()
            })
            .await
            .map_err(|e| BrokerError::Topic {
                topic: topic.to_owned(),
                message: format!("failed to create stream: {e}"),
            })?;
        self.partitions.write().await.insert(topic.to_owned(), partitions);
        info!(topic = topic, partitions, "stream created");
        Ok(())
    }

    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let partition = partition_for(key, self.partitions_of(topic).await);
        let subject = format!("{topic}.{partition}");

        let mut headers = async_nats::HeaderMap::new();
        headers.insert(KEY_HEADER, key);

        let ack = self
            .jetstream
            .publish_with_headers(subject.clone(), headers, payload.into())
            .await
            .map_err(|e| BrokerError::Publish {
                topic: topic.to_owned(),
                message: format!("failed to publish to {subject}: {e}"),
            })?;
        ack.await.map_err(|e| BrokerError::Publish {
            topic: topic.to_owned(),
            message: format!("no acknowledgement on {subject}: {e}"),
        })?;

        debug!(subject = %subject, key = key, "record acknowledged");
        Ok(())
    }

    async fn flush(&self) -> Result<(), BrokerError> {
        self.client
            .flush()
            .await
            .map_err(|e| BrokerError::Flush(e.to_string()))
    }
}
