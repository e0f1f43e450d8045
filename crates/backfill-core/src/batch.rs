//! Size-bounded accumulator for outbound messages.
//!
//! `BatchPublisher` buffers serialized records and hands them to a
//! [`MessageWriter`] in groups of at most `threshold` messages. The caller
//! decides when to flush: the extractor checks [`is_full`](BatchPublisher::is_full)
//! before each row and flushes once more when the source is exhausted.
//!
//! # Example
//!
//! ```ignore
//! let mut batch = BatchPublisher::new(&writer, 500);
//! for message in messages {
//!     if batch.is_full() {
//!         batch.flush()?;
//!     }
//!     batch.append(message);
//! }
//! batch.flush()?;
//! ```

use crate::error::Result;
use crate::traits::MessageWriter;
use crate::types::OutboundMessage;

pub struct BatchPublisher<W> {
    writer: W,
    threshold: usize,
    pending: Vec<OutboundMessage>,
    flushes: usize,
    published: usize,
}

impl<W: MessageWriter> BatchPublisher<W> {
    /// A threshold of zero is treated as one.
    pub fn new(writer: W, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            writer,
            threshold,
            pending: Vec::with_capacity(threshold),
            flushes: 0,
            published: 0,
        }
    }

    /// Buffer a message for the next flush.
    pub fn append(&mut self, message: OutboundMessage) {
        self.pending.push(message);
    }

    /// Return `true` once the buffer holds `threshold` messages.
    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.threshold
    }

    /// Publish everything buffered as one batch and clear the buffer.
    ///
    /// Does nothing when the buffer is empty. The buffer is cleared even when
    /// the publish fails; those messages are not retried.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let batch = std::mem::take(&mut self.pending);
        self.flushes += 1;
        self.writer.publish_batch(&batch)?;
        self.published += batch.len();

        tracing::debug!(
            "Flushed batch #{} with {} messages",
            self.flushes,
            batch.len()
        );
        Ok(())
    }

    /// Return the number of buffered messages.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Return `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of publish calls made so far, failed ones included.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Number of messages the writer accepted.
    pub fn published(&self) -> usize {
        self.published
    }
}
