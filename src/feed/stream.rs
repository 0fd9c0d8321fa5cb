//! Duplex change feed stream
//!
//! [`ChangesStream`] is written to through [`FeedSink`] and read from through
//! [`FeedSource`] plus the [`RecordHandler`] it owns. All delivery happens
//! synchronously inside `write`, `end` and `resume`.

use super::backpressure::DeliveryQueue;
use super::handler::{FlowControl, RecordHandler};
use super::splitter::{RecordSplitter, SplitOutcome};
use super::types::{FeedMode, FeedSummary, StreamState};
use crate::config::FeedConfig;
use crate::error::FeedError;

/// Writable side of a feed: accepts chunks and a completion signal
pub trait FeedSink {
    /// Write one chunk of any length
    fn feed(&mut self, chunk: &[u8]) -> Result<(), FeedError>;

    /// Signal that no more chunks will arrive
    fn finish(&mut self) -> Result<(), FeedError>;

    /// Tear down immediately
    fn abort(&mut self);

    /// Whether the sink still accepts chunks
    fn is_writable(&self) -> bool;
}

/// Readable side of a feed: flow control over record delivery
pub trait FeedSource {
    fn pause(&mut self);
    fn resume(&mut self);
    fn is_paused(&self) -> bool;
    fn is_readable(&self) -> bool;
}

/// Notification waiting for the queue to drain
#[derive(Debug)]
enum Terminal {
    End(SplitOutcome),
    Error(FeedError),
    /// Close without notifying
    Silent,
}

/// Incremental change feed parser with pause/resume delivery
pub struct ChangesStream<H: RecordHandler> {
    config: FeedConfig,
    mode: Option<FeedMode>,
    splitter: Option<RecordSplitter>,
    state: StreamState,
    queue: DeliveryQueue,
    handler: H,
    delivered: u64,
    terminal: Option<Terminal>,
}

impl<H: RecordHandler> ChangesStream<H> {
    /// Create a stream; the mode is validated on the first write
    pub fn new(config: FeedConfig, handler: H) -> Self {
        Self {
            config,
            mode: None,
            splitter: None,
            state: StreamState::Open,
            queue: DeliveryQueue::new(),
            handler,
            delivered: 0,
            terminal: None,
        }
    }

    /// Create a stream, validating the mode immediately
    pub fn try_new(config: FeedConfig, handler: H) -> Result<Self, FeedError> {
        let mode = config.mode()?;
        let mut stream = Self::new(config, handler);
        stream.select_mode(mode);
        Ok(stream)
    }

    fn select_mode(&mut self, mode: FeedMode) {
        tracing::debug!(mode = %mode, "Selected feed mode");
        self.splitter = Some(RecordSplitter::new(mode, &self.config));
        self.mode = Some(mode);
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// The resolved mode, once the first write or `try_new` has validated it
    pub fn mode(&self) -> Option<FeedMode> {
        self.mode
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_writable(&self) -> bool {
        self.state == StreamState::Open
    }

    pub fn is_readable(&self) -> bool {
        match self.state {
            StreamState::Open | StreamState::Ended => true,
            StreamState::Failed => self.terminal.is_some(),
            StreamState::Closed => false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.queue.is_paused()
    }

    /// Records extracted but held back by a pause
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Records handed to the handler so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Bytes buffered towards a record that is not complete yet
    pub fn buffered(&self) -> usize {
        self.splitter.as_ref().map_or(0, RecordSplitter::buffered)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Write a chunk; grammar violations are returned here and fail the stream
    pub fn write<C: AsRef<[u8]>>(&mut self, chunk: C) -> Result<(), FeedError> {
        self.ensure_writable()?;
        self.ingest(chunk.as_ref()).map_err(|e| self.fail(e))
    }

    /// Signal the end of input
    pub fn end(&mut self) -> Result<(), FeedError> {
        self.end_with(b"")
    }

    /// Write a final chunk, then signal the end of input
    pub fn end_with<C: AsRef<[u8]>>(&mut self, chunk: C) -> Result<(), FeedError> {
        self.ensure_writable()?;
        if let Err(e) = self.ingest(chunk.as_ref()) {
            return Err(self.fail(e));
        }
        if self.state != StreamState::Open {
            // Destroyed by the handler while the final chunk was delivered
            return Ok(());
        }

        let outcome = self
            .splitter
            .take()
            .map(|mut splitter| splitter.finish())
            .unwrap_or_default();
        if outcome.discarded > 0 {
            tracing::debug!(
                bytes = outcome.discarded,
                "Discarding incomplete data at end of feed"
            );
        }
        if !outcome.complete {
            tracing::debug!("Feed ended before the results envelope closed");
        }

        self.state = StreamState::Ended;
        self.terminal = Some(Terminal::End(outcome));
        self.settle();
        Ok(())
    }

    /// Stop immediately, dropping queued records and all further notifications
    pub fn destroy(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        let dropped = self.queue.clear();
        tracing::debug!(dropped, state = %self.state, "Destroying change feed");
        self.splitter = None;
        self.terminal = None;
        self.state = StreamState::Closed;
    }

    /// Stop accepting input, deliver what is queued, then close silently
    pub fn destroy_soon(&mut self) {
        match self.state {
            StreamState::Open => {
                if let Some(mut splitter) = self.splitter.take() {
                    let outcome = splitter.finish();
                    if outcome.discarded > 0 {
                        tracing::debug!(bytes = outcome.discarded, "Discarding partial input");
                    }
                }
                self.state = StreamState::Ended;
                self.terminal = Some(Terminal::Silent);
            }
            StreamState::Ended | StreamState::Failed if self.terminal.is_some() => {
                self.terminal = Some(Terminal::Silent);
            }
            _ => return,
        }
        self.settle();
    }

    /// Hold records until [`ChangesStream::resume`]
    pub fn pause(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        if self.queue.pause() {
            tracing::trace!("Change feed paused");
        }
    }

    /// Deliver every held record now, then continue delivering immediately
    pub fn resume(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        if self.queue.resume() {
            tracing::trace!("Change feed resumed");
            self.deliver();
        }
    }

    fn ensure_writable(&self) -> Result<(), FeedError> {
        if self.state == StreamState::Open {
            Ok(())
        } else {
            Err(FeedError::StreamClosed { state: self.state })
        }
    }

    fn ingest(&mut self, chunk: &[u8]) -> Result<(), FeedError> {
        if self.mode.is_none() {
            let mode = self.config.mode()?;
            self.select_mode(mode);
        }
        if let Some(splitter) = self.splitter.as_mut() {
            splitter.push(chunk)?;
        }

        loop {
            let record = match self.splitter.as_mut() {
                Some(splitter) => splitter.next_record()?,
                None => None,
            };
            let Some(record) = record else {
                break;
            };
            self.queue.push(record);
            self.deliver();
        }
        Ok(())
    }

    fn deliver(&mut self) {
        while let Some(record) = self.queue.pop_ready() {
            let mut flow = FlowControl::new(self.queue.len());
            self.handler.on_record(&record, &mut flow);
            self.delivered += 1;

            if flow.destroy_requested() {
                self.destroy();
                return;
            }
            if flow.pause_requested() && self.queue.pause() {
                tracing::trace!("Change feed paused by handler");
            }
        }
        self.settle();
    }

    /// Fire the pending terminal notification once nothing is queued
    fn settle(&mut self) {
        if !self.queue.is_empty() {
            return;
        }
        let Some(terminal) = self.terminal.take() else {
            return;
        };

        match terminal {
            Terminal::End(outcome) => {
                self.state = StreamState::Closed;
                let summary = FeedSummary {
                    records: self.delivered,
                    heartbeats: outcome.heartbeats,
                    last_seq: outcome.last_seq,
                    complete: outcome.complete,
                };
                tracing::debug!(
                    records = summary.records,
                    complete = summary.complete,
                    "Change feed ended"
                );
                self.handler.on_end(&summary);
            }
            Terminal::Error(error) => self.handler.on_error(&error),
            Terminal::Silent => {
                tracing::debug!(records = self.delivered, "Change feed closed");
                self.state = StreamState::Closed;
            }
        }
    }

    fn fail(&mut self, error: FeedError) -> FeedError {
        if !error.is_fatal() || self.state == StreamState::Closed {
            return error;
        }
        tracing::warn!(code = error.code(), "Change feed failed: {}", error);
        self.state = StreamState::Failed;
        self.splitter = None;
        self.terminal = Some(Terminal::Error(error.clone()));
        self.settle();
        error
    }
}

impl<H: RecordHandler> FeedSink for ChangesStream<H> {
    fn feed(&mut self, chunk: &[u8]) -> Result<(), FeedError> {
        self.write(chunk)
    }

    fn finish(&mut self) -> Result<(), FeedError> {
        self.end()
    }

    fn abort(&mut self) {
        self.destroy()
    }

    fn is_writable(&self) -> bool {
        ChangesStream::is_writable(self)
    }
}

impl<H: RecordHandler> FeedSource for ChangesStream<H> {
    fn pause(&mut self) {
        ChangesStream::pause(self)
    }

    fn resume(&mut self) {
        ChangesStream::resume(self)
    }

    fn is_paused(&self) -> bool {
        ChangesStream::is_paused(self)
    }

    fn is_readable(&self) -> bool {
        ChangesStream::is_readable(self)
    }
}
