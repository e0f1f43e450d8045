//! Deterministic in-memory doubles for the bus and the source store.
//!
//! Used by this crate's tests and by downstream crates that want to drive the
//! pipeline without a broker or a database. Clones share state, so a test can
//! hand one clone to the pipeline and inspect the other afterwards.

use crate::{
    error::{BridgeError, Result},
    shutdown::ShutdownHandle,
    traits::{MessageReader, MessageWriter, RowVisitor, SourceStore},
    types::{Category, InboundMessage, OutboundMessage, SourceRecord, TimeWindow},
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Default)]
struct ReaderState {
    queue: VecDeque<Result<InboundMessage>>,
    committed: Vec<InboundMessage>,
    commit_error: Option<String>,
    fetches: usize,
}

/// Scripted message source.
///
/// Returns queued messages in order. Once the queue is empty, or the shutdown
/// flag is set, `fetch_next` returns [`BridgeError::Cancelled`], which ends a
/// dispatch loop the same way a shutdown does.
#[derive(Clone, Default)]
pub struct MemoryReader {
    state: Arc<Mutex<ReaderState>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(self, message: InboundMessage) -> Self {
        self.state.lock().queue.push_back(Ok(message));
        self
    }

    /// Queue a fetch failure.
    pub fn push_error(self, error: BridgeError) -> Self {
        self.state.lock().queue.push_back(Err(error));
        self
    }

    /// Make every commit fail with a transport error.
    pub fn with_commit_error(self, msg: impl Into<String>) -> Self {
        self.state.lock().commit_error = Some(msg.into());
        self
    }

    /// Messages committed so far, in commit order.
    pub fn committed(&self) -> Vec<InboundMessage> {
        self.state.lock().committed.clone()
    }

    /// Number of `fetch_next` calls, including the failing ones.
    pub fn fetches(&self) -> usize {
        self.state.lock().fetches
    }
}

impl MessageReader for MemoryReader {
    fn fetch_next(&mut self, shutdown: &ShutdownHandle) -> Result<InboundMessage> {
        let mut state = self.state.lock();
        state.fetches += 1;
        if shutdown.is_shutdown() {
            return Err(BridgeError::Cancelled);
        }
        state.queue.pop_front().unwrap_or(Err(BridgeError::Cancelled))
    }

    fn commit(&mut self, message: &InboundMessage) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(msg) = &state.commit_error {
            return Err(BridgeError::Transport(msg.clone()));
        }
        state.committed.push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
struct WriterState {
    batches: Vec<Vec<OutboundMessage>>,
    calls: usize,
    fail_from: Option<(usize, String)>,
}

/// Recording message sink.
#[derive(Clone, Default)]
pub struct MemoryWriter {
    state: Arc<Mutex<WriterState>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer whose every publish fails with a transport error.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self::new().fail_from_call(0, msg)
    }

    /// Fail every publish starting with the zero-based call `call`.
    pub fn fail_from_call(self, call: usize, msg: impl Into<String>) -> Self {
        self.state.lock().fail_from = Some((call, msg.into()));
        self
    }

    /// Number of `publish_batch` calls, failed ones included.
    pub fn publish_calls(&self) -> usize {
        self.state.lock().calls
    }

    /// Batches that were accepted, in publish order.
    pub fn batches(&self) -> Vec<Vec<OutboundMessage>> {
        self.state.lock().batches.clone()
    }

    /// All accepted messages, flattened in publish order.
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.state.lock().batches.iter().flatten().cloned().collect()
    }
}

impl MessageWriter for MemoryWriter {
    fn publish_batch(&self, messages: &[OutboundMessage]) -> Result<()> {
        let mut state = self.state.lock();
        let call = state.calls;
        state.calls += 1;

        if let Some((from, msg)) = &state.fail_from {
            if call >= *from {
                return Err(BridgeError::Transport(msg.clone()));
            }
        }
        state.batches.push(messages.to_vec());
        Ok(())
    }
}

/// Source store holding its rows in memory.
///
/// Rows are returned in insertion order; callers insert them already sorted
/// the way the real query would return them.
#[derive(Default)]
pub struct MemoryStore {
    records: Vec<std::result::Result<SourceRecord, String>>,
    categories: Vec<std::result::Result<Category, String>>,
    ping_error: Option<String>,
    query_error: Option<String>,
    windows: Mutex<Vec<TimeWindow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SourceRecord>) -> Self {
        Self {
            records: records.into_iter().map(Ok).collect(),
            ..Self::default()
        }
    }

    pub fn push_record(mut self, record: SourceRecord) -> Self {
        self.records.push(Ok(record));
        self
    }

    /// Append a row that fails to decode with `msg`.
    pub fn push_bad_record(mut self, msg: impl Into<String>) -> Self {
        self.records.push(Err(msg.into()));
        self
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories.into_iter().map(Ok).collect();
        self
    }

    /// Append a category row that fails to decode with `msg`.
    pub fn push_bad_category(mut self, msg: impl Into<String>) -> Self {
        self.categories.push(Err(msg.into()));
        self
    }

    pub fn with_ping_error(mut self, msg: impl Into<String>) -> Self {
        self.ping_error = Some(msg.into());
        self
    }

    /// Make both queries fail before yielding any row.
    pub fn with_query_error(mut self, msg: impl Into<String>) -> Self {
        self.query_error = Some(msg.into());
        self
    }

    /// Windows passed to `scan_records`, in call order.
    pub fn record_windows(&self) -> Vec<TimeWindow> {
        self.windows.lock().clone()
    }

    fn check_query(&self) -> Result<()> {
        match &self.query_error {
            Some(msg) => Err(BridgeError::Store(msg.clone())),
            None => Ok(()),
        }
    }
}

impl SourceStore for MemoryStore {
    fn ping(&self) -> Result<()> {
        match &self.ping_error {
            Some(msg) => Err(BridgeError::Store(msg.clone())),
            None => Ok(()),
        }
    }

    fn scan_records(
        &self,
        window: &TimeWindow,
        visit: &mut RowVisitor<'_, SourceRecord>,
    ) -> Result<()> {
        self.windows.lock().push(*window);
        self.check_query()?;

        for row in &self.records {
            visit(row.clone().map_err(BridgeError::RowDecode))?;
        }
        Ok(())
    }

    fn scan_categories(&self, visit: &mut RowVisitor<'_, Category>) -> Result<()> {
        self.check_query()?;

        for row in &self.categories {
            visit(row.clone().map_err(BridgeError::RowDecode))?;
        }
        Ok(())
    }
}
