//! Kafka client configuration.

use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection and topic settings shared by the reader and the writers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Kafka broker addresses (comma-separated).
    pub brokers: String,

    /// Consumer group that owns the committed offsets of the meta topic.
    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Topic carrying refresh signals and summary notifications.
    #[serde(default = "default_meta_topic")]
    pub meta_topic: String,

    /// Topic receiving one message per extracted record.
    #[serde(default = "default_records_topic")]
    pub records_topic: String,

    /// How long a single consumer poll blocks before the shutdown flag is
    /// checked again.
    /// Default: 1000ms
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Socket timeout, and upper bound for delivering a published batch.
    /// Default: 10s
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Client-side send attempts per message.
    /// Default: 3
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_group_id() -> String {
    "source-db-records-importer".to_string()
}

fn default_meta_topic() -> String {
    "meta_events".to_string()
}

fn default_records_topic() -> String {
    "raw_records".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_attempts() -> u32 {
    3
}

impl KafkaConfig {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: default_group_id(),
            meta_topic: default_meta_topic(),
            records_topic: default_records_topic(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_timeout_ms(),
            attempts: default_attempts(),
        }
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Consumer settings. Offsets are only committed explicitly, after a
    /// message has been fully processed.
    pub fn consumer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("socket.timeout.ms", self.timeout_ms.to_string());
        config
    }

    pub fn producer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("acks", "all")
            .set("socket.timeout.ms", self.timeout_ms.to_string())
            .set("message.timeout.ms", self.timeout_ms.to_string())
            .set(
                "message.send.max.retries",
                self.attempts.saturating_sub(1).to_string(),
            );
        config
    }
}
