//! Kafka adapters for the backfill pipeline
//!
//! - [`KafkaReader`]: consumes the meta topic with manual, per-message commits
//! - [`KafkaWriter`]: publishes batches to one topic and waits for delivery

pub mod config;
pub mod reader;
pub mod writer;

pub use config::KafkaConfig;
pub use reader::KafkaReader;
pub use writer::{DeliveryTracker, KafkaWriter};
