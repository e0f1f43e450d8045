//! Backfill Core: re-publishing a refreshed relational store as bus events
//!
//! Waits for a "source database refreshed" signal on the bus, re-extracts
//! the refreshed time range from the store and publishes it as individual
//! record events, followed by two summary notifications.
//!
//! Building blocks:
//! - [`BatchPublisher`]: size-bounded outbound buffer
//! - [`Extractor`]: store rows -> record events, plus the category list
//! - [`BusNotifier`]: completion and category-list notifications
//! - [`DispatchLoop`]: fetch -> dispatch -> commit, at-least-once
//!
//! The bus and the store are reached through [`MessageReader`],
//! [`MessageWriter`] and [`SourceStore`]; [`testing`] holds in-memory
//! implementations of all three.
//!
//! # Example
//!
//! ```
//! use backfill_core::testing::{MemoryReader, MemoryStore, MemoryWriter};
//! use backfill_core::{BridgeConfig, BusNotifier, DispatchLoop, Extractor};
//!
//! let store = MemoryStore::new();
//! let records = MemoryWriter::new();
//! let meta = MemoryWriter::new();
//!
//! let extractor = Extractor::new(&store, &records, BridgeConfig::default());
//! let notifier = BusNotifier::new(&meta);
//! let mut dispatch = DispatchLoop::new(MemoryReader::new(), extractor, notifier);
//!
//! // An empty reader reports cancellation, which ends the loop.
//! assert!(dispatch.run().is_cancelled());
//! ```

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extractor;
pub mod notifier;
pub mod shutdown;
pub mod testing;
pub mod traits;
pub mod types;

pub use batch::BatchPublisher;
pub use config::BridgeConfig;
pub use dispatch::{CycleOutcome, DispatchLoop};
pub use error::{BridgeError, Result};
pub use extractor::{ExtractStats, Extractor, RecordExtractor};
pub use notifier::{BusNotifier, RefreshNotifier};
pub use shutdown::ShutdownHandle;
pub use traits::{MessageReader, MessageWriter, RowVisitor, SourceStore};
pub use types::{
    Category, CategoryList, InboundMessage, MessagePosition, OutboundMessage, RecordEvent,
    RefreshProcessed, RefreshSignal, SourceRecord, TimeWindow, CATEGORY_LIST_KEY,
    RECORD_EVENT_KEY, REFRESH_PROCESSED_KEY, REFRESH_SIGNAL_KEY,
};
