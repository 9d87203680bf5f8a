//! In-process broker.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Broker, BrokerError};

/// A record accepted by [`MemoryBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    /// Destination topic.
    pub topic: String,
    /// Partition key.
    pub key: String,
    /// Encoded record body.
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    topics: BTreeMap<String, u32>,
    topic_creations: usize,
    records: Vec<PublishedRecord>,
    fail_publish: bool,
    fail_admin: bool,
}

/// Broker that keeps topics and records in memory.
///
/// Used when the engine is configured with `broker.kind: memory` and by
/// the test suites, which can also make it refuse publishes or topic
/// administration to exercise the failure paths.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    inner: Mutex<Inner>,
}

impl MemoryBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail.
    pub async fn fail_publishes(&self, fail: bool) {
        self.inner.lock().await.fail_publish = fail;
    }

    /// Make every subsequent topic check or creation fail.
    pub async fn fail_admin(&self, fail: bool) {
        self.inner.lock().await.fail_admin = fail;
    }

    /// Snapshot of every accepted record, oldest first.
    pub async fn records(&self) -> Vec<PublishedRecord> {
        self.inner.lock().await.records.clone()
    }

    /// Number of accepted records.
    pub async fn record_count(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    /// Partition count of `topic`, if it exists.
    pub async fn partitions(&self, topic: &str) -> Option<u32> {
        self.inner.lock().await.topics.get(topic).copied()
    }

    /// How many times a topic was actually created.
    pub async fn topic_creations(&self) -> usize {
        self.inner.lock().await.topic_creations
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn topic_exists(&self, topic: &str) -> Result<bool, BrokerError> {
        let inner = self.inner.lock().await;
        if inner.fail_admin {
            return Err(BrokerError::Topic {
                topic: topic.to_owned(),
                message: String::from("broker unavailable"),
            });
        }
        Ok(inner.topics.contains_key(topic))
    }

    async fn create_topic(&self, topic: &str, partitions: u32) -> Result<(), BrokerError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_admin {
            return Err(BrokerError::Topic {
                topic: topic.to_owned(),
                message: String::from("broker unavailable"),
            });
        }
        if inner.topics.contains_key(topic) {
            return Err(BrokerError::Topic {
                topic: topic.to_owned(),
                message: String::from("topic already exists"),
            });
        }
        inner.topics.insert(topic.to_owned(), partitions);
        inner.topic_creations = inner.topic_creations.saturating_add(1);
        Ok(())
    }

    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_publish {
            return Err(BrokerError::Publish {
                topic: topic.to_owned(),
                message: String::from("broker rejected record"),
            });
        }
        if !inner.topics.contains_key(topic) {
            return Err(BrokerError::Publish {
                topic: topic.to_owned(),
                message: String::from("unknown topic"),
            });
        }
        inner.records.push(PublishedRecord {
            topic: topic.to_owned(),
            key: key.to_owned(),
            payload,
        });
        Ok(())
    }

    async fn flush(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}
