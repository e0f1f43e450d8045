//! Capabilities the pipeline needs from the outside world.
//!
//! Each trait has a production adapter (`backfill-kafka`, `backfill-sqlite`)
//! and an in-memory double in [`crate::testing`].

use crate::error::Result;
use crate::shutdown::ShutdownHandle;
use crate::types::{Category, InboundMessage, OutboundMessage, SourceRecord, TimeWindow};
use std::sync::Arc;

/// Callback receiving rows from a store scan.
///
/// Each item is either a decoded row or the decode error for that row.
/// Returning an error stops the scan and the store returns that error.
pub type RowVisitor<'a, T> = dyn FnMut(Result<T>) -> Result<()> + 'a;

/// Consuming side of the message bus.
pub trait MessageReader {
    /// Block until the next message is available.
    ///
    /// Returns [`BridgeError::Cancelled`](crate::BridgeError::Cancelled)
    /// once `shutdown` is set.
    fn fetch_next(&mut self, shutdown: &ShutdownHandle) -> Result<InboundMessage>;

    /// Mark `message` (and everything before it on its partition) as consumed.
    fn commit(&mut self, message: &InboundMessage) -> Result<()>;
}

/// Producing side of the message bus.
pub trait MessageWriter {
    /// Publish all messages as one batch. Returns once the bus accepted them.
    fn publish_batch(&self, messages: &[OutboundMessage]) -> Result<()>;
}

impl<W: MessageWriter + ?Sized> MessageWriter for &W {
    fn publish_batch(&self, messages: &[OutboundMessage]) -> Result<()> {
        (**self).publish_batch(messages)
    }
}

impl<W: MessageWriter + ?Sized> MessageWriter for Arc<W> {
    fn publish_batch(&self, messages: &[OutboundMessage]) -> Result<()> {
        (**self).publish_batch(messages)
    }
}

/// The legacy relational store records are extracted from.
pub trait SourceStore {
    /// Cheap liveness probe, issued before any query.
    fn ping(&self) -> Result<()>;

    /// Stream every record registered inside `window`, ordered by id
    /// descending.
    fn scan_records(
        &self,
        window: &TimeWindow,
        visit: &mut RowVisitor<'_, SourceRecord>,
    ) -> Result<()>;

    /// Stream the full category reference table.
    fn scan_categories(&self, visit: &mut RowVisitor<'_, Category>) -> Result<()>;
}

impl<S: SourceStore + ?Sized> SourceStore for &S {
    fn ping(&self) -> Result<()> {
        (**self).ping()
    }

    fn scan_records(
        &self,
        window: &TimeWindow,
        visit: &mut RowVisitor<'_, SourceRecord>,
    ) -> Result<()> {
        (**self).scan_records(window, visit)
    }

    fn scan_categories(&self, visit: &mut RowVisitor<'_, Category>) -> Result<()> {
        (**self).scan_categories(visit)
    }
}

impl<S: SourceStore + ?Sized> SourceStore for Arc<S> {
    fn ping(&self) -> Result<()> {
        (**self).ping()
    }

    fn scan_records(
        &self,
        window: &TimeWindow,
        visit: &mut RowVisitor<'_, SourceRecord>,
    ) -> Result<()> {
        (**self).scan_records(window, visit)
    }

    fn scan_categories(&self, visit: &mut RowVisitor<'_, Category>) -> Result<()> {
        (**self).scan_categories(visit)
    }
}
