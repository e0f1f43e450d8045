//! Dispatch loop: one inbound message per cycle
//!
//! Fetches a message, runs the refresh pipeline when the key is the refresh
//! signal, and commits the message only after every step succeeded. Any
//! error stops the loop and is returned to the caller without committing,
//! so the message is delivered again after a restart.

use crate::{
    error::{BridgeError, Result},
    extractor::{ExtractStats, RecordExtractor},
    notifier::RefreshNotifier,
    shutdown::ShutdownHandle,
    traits::MessageReader,
    types::{InboundMessage, RefreshSignal, REFRESH_SIGNAL_KEY},
};

/// What a completed cycle did with its message.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// The message was a refresh signal and the pipeline ran to completion.
    Processed {
        signal: RefreshSignal,
        stats: ExtractStats,
        categories: usize,
    },
    /// The key did not match; the message was committed untouched.
    Skipped { key: String },
}

pub struct DispatchLoop<R, E, N> {
    reader: R,
    extractor: E,
    notifier: N,
    shutdown: ShutdownHandle,
    cycles: u64,
}

impl<R, E, N> DispatchLoop<R, E, N>
where
    R: MessageReader,
    E: RecordExtractor,
    N: RefreshNotifier,
{
    pub fn new(reader: R, extractor: E, notifier: N) -> Self {
        Self {
            reader,
            extractor,
            notifier,
            shutdown: ShutdownHandle::new(),
            cycles: 0,
        }
    }

    /// Use an externally owned shutdown flag instead of a private one.
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Get a handle for stopping the loop
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Number of committed cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run until a fetch, pipeline or commit fails, and return that error.
    ///
    /// A shutdown request surfaces as [`BridgeError::Cancelled`] from the
    /// pending fetch.
    pub fn run(&mut self) -> BridgeError {
        tracing::info!("Dispatch loop started");

        loop {
            match self.run_once() {
                Ok(CycleOutcome::Processed { stats, .. }) => {
                    tracing::debug!(
                        "Cycle {} committed after {} records",
                        self.cycles,
                        stats.rows_processed
                    );
                }
                Ok(CycleOutcome::Skipped { .. }) => {}
                Err(e) => {
                    tracing::info!("Dispatch loop stopped after {} cycles", self.cycles);
                    return e;
                }
            }
        }
    }

    /// Fetch, handle and commit exactly one message.
    pub fn run_once(&mut self) -> Result<CycleOutcome> {
        let message = self.reader.fetch_next(&self.shutdown)?;
        let outcome = self.dispatch(&message)?;

        self.reader.commit(&message)?;
        self.cycles += 1;
        Ok(outcome)
    }

    fn dispatch(&self, message: &InboundMessage) -> Result<CycleOutcome> {
        if !message.has_key(REFRESH_SIGNAL_KEY) {
            let key = String::from_utf8_lossy(&message.key).into_owned();
            tracing::debug!(
                "Skipping message {:?} at {}:{}",
                key,
                message.position.partition,
                message.position.offset
            );
            return Ok(CycleOutcome::Skipped { key });
        }

        let signal: RefreshSignal = message.decode()?;
        tracing::info!(
            "Received refresh signal: {} -> {} (year {})",
            signal.previous_refresh,
            signal.current_refresh,
            signal.year
        );

        self.process(signal)
    }

    fn process(&self, signal: RefreshSignal) -> Result<CycleOutcome> {
        let categories = self.extractor.list_categories()?;
        self.notifier.notify_categories(&categories, signal.year)?;

        let stats = self.extractor.extract(
            signal.previous_refresh,
            signal.current_refresh,
            signal.year,
        )?;
        self.notifier.notify_completion(&signal)?;

        Ok(CycleOutcome::Processed {
            signal,
            stats,
            categories: categories.len(),
        })
    }
}
