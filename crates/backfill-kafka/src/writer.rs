use backfill_core::{
    error::{BridgeError, Result},
    traits::MessageWriter,
    types::OutboundMessage,
};
use parking_lot::Mutex;
use rdkafka::client::ClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{
    BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext, PurgeConfig,
};
use rdkafka::util::Timeout;
use std::time::Duration;

use crate::config::KafkaConfig;

/// Producer context remembering the first failed delivery since the last
/// [`take_failure`](DeliveryTracker::take_failure).
///
/// Delivery reports run inside `poll`/`flush` on the publishing thread.
#[derive(Default)]
pub struct DeliveryTracker {
    failure: Mutex<Option<String>>,
}

impl DeliveryTracker {
    fn take_failure(&self) -> Option<String> {
        self.failure.lock().take()
    }
}

impl ClientContext for DeliveryTracker {}

impl ProducerContext for DeliveryTracker {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        if let Err((err, _message)) = result {
            let mut failure = self.failure.lock();
            if failure.is_none() {
                *failure = Some(err.to_string());
            }
        }
    }
}

/// Publishes batches to a single topic and waits until every message in
/// the batch was acknowledged.
pub struct KafkaWriter {
    producer: BaseProducer<DeliveryTracker>,
    topic: String,
    timeout: Duration,
}

impl KafkaWriter {
    pub fn new(config: &KafkaConfig, topic: impl Into<String>) -> Result<Self> {
        Self::from_client_config(&config.producer_config(), topic, config.timeout())
    }

    fn from_client_config(
        client_config: &ClientConfig,
        topic: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let producer = client_config
            .create_with_context(DeliveryTracker::default())
            .map_err(BridgeError::transport)?;

        Ok(Self {
            producer,
            topic: topic.into(),
            timeout,
        })
    }

    /// Writer for the per-record topic.
    pub fn records(config: &KafkaConfig) -> Result<Self> {
        Self::new(config, config.records_topic.clone())
    }

    /// Writer for the meta topic (summary notifications).
    pub fn meta(config: &KafkaConfig) -> Result<Self> {
        Self::new(config, config.meta_topic.clone())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl MessageWriter for KafkaWriter {
    fn publish_batch(&self, messages: &[OutboundMessage]) -> Result<()> {
        let sent = messages.iter().try_for_each(|message| {
            let record = BaseRecord::to(&self.topic)
                .key(message.key.as_str())
                .payload(message.payload.as_slice());
            self.producer
                .send(record)
                .map_err(|(err, _record)| BridgeError::transport(err))
        });

        // Part of the batch may already be queued even when a send failed.
        let flushed = self
            .producer
            .flush(Timeout::After(self.timeout))
            .map_err(BridgeError::transport);
        if flushed.is_err() {
            self.discard_pending();
        }

        // Always drained, so failures never leak into the next batch.
        let delivered = match self.producer.context().take_failure() {
            Some(err) => Err(BridgeError::Transport(err)),
            None => Ok(()),
        };

        sent.and(flushed).and(delivered)
    }
}

impl KafkaWriter {
    /// Drop queued and in-flight messages and serve their delivery reports.
    fn discard_pending(&self) {
        self.producer.purge(PurgeConfig::default().queue().inflight());
        if let Err(e) = self.producer.flush(Timeout::After(self.timeout)) {
            tracing::warn!("Failed to settle purged messages for {}: {}", self.topic, e);
        }
    }
}

impl Drop for KafkaWriter {
    fn drop(&mut self) {
        if let Err(e) = self.producer.flush(Timeout::After(self.timeout)) {
            tracing::warn!("Failed to flush producer for {}: {}", self.topic, e);
        }
    }
}
