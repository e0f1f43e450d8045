use backfill_core::{
    error::{BridgeError, Result},
    shutdown::ShutdownHandle,
    traits::MessageReader,
    types::{InboundMessage, MessagePosition},
};
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;

use crate::config::KafkaConfig;

/// Group consumer on the meta topic with manual offset commits.
pub struct KafkaReader {
    consumer: BaseConsumer,
    poll_interval: Duration,
}

impl KafkaReader {
    /// Create the consumer and subscribe it to `config.meta_topic`.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let consumer: BaseConsumer = config
            .consumer_config()
            .create()
            .map_err(BridgeError::transport)?;
        consumer
            .subscribe(&[config.meta_topic.as_str()])
            .map_err(BridgeError::transport)?;

        tracing::info!(
            "Subscribed to {} as group {}",
            config.meta_topic,
            config.group_id
        );

        Ok(Self {
            consumer,
            poll_interval: config.poll_interval(),
        })
    }
}

impl MessageReader for KafkaReader {
    fn fetch_next(&mut self, shutdown: &ShutdownHandle) -> Result<InboundMessage> {
        loop {
            if shutdown.is_shutdown() {
                return Err(BridgeError::Cancelled);
            }

            let message = match self.consumer.poll(self.poll_interval) {
                None => continue,
                Some(result) => result.map_err(BridgeError::transport)?,
            };

            return Ok(InboundMessage {
                key: message.key().map(<[u8]>::to_vec).unwrap_or_default(),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                position: MessagePosition {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                },
            });
        }
    }

    fn commit(&mut self, message: &InboundMessage) -> Result<()> {
        let position = &message.position;
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &position.topic,
            position.partition,
            Offset::Offset(position.offset + 1),
        )
        .map_err(BridgeError::transport)?;

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(BridgeError::transport)
    }
}

impl Drop for KafkaReader {
    fn drop(&mut self) {
        self.consumer.unsubscribe();
    }
}
