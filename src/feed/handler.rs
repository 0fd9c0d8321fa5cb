//! Record handler trait and implementations

use super::types::{FeedEvent, FeedSummary};
use crate::error::FeedError;
use std::io::Write;
use tokio::sync::mpsc;

/// Requests a handler can make from inside [`RecordHandler::on_record`]
///
/// Requests take effect before the next record is delivered.
#[derive(Debug, Default)]
pub struct FlowControl {
    pause: bool,
    destroy: bool,
    remaining: usize,
}

impl FlowControl {
    pub(crate) fn new(remaining: usize) -> Self {
        Self {
            pause: false,
            destroy: false,
            remaining,
        }
    }

    /// Stop delivery until the stream is resumed
    pub fn pause(&mut self) {
        self.pause = true;
    }

    /// Tear the stream down, discarding anything not yet delivered
    pub fn destroy(&mut self) {
        self.destroy = true;
    }

    /// Records already extracted and waiting behind this one
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn pause_requested(&self) -> bool {
        self.pause
    }

    pub fn destroy_requested(&self) -> bool {
        self.destroy
    }
}

/// Receives the notifications of a change feed stream
///
/// A stream calls `on_record` zero or more times and then at most one of
/// `on_end` or `on_error`.
pub trait RecordHandler {
    /// Handle one record, exactly as it appeared in the feed
    fn on_record(&mut self, record: &str, flow: &mut FlowControl);

    /// Handle normal completion
    fn on_end(&mut self, _summary: &FeedSummary) {}

    /// Handle a fatal stream error
    fn on_error(&mut self, _error: &FeedError) {}
}

impl<H: RecordHandler + ?Sized> RecordHandler for Box<H> {
    fn on_record(&mut self, record: &str, flow: &mut FlowControl) {
        (**self).on_record(record, flow)
    }

    fn on_end(&mut self, summary: &FeedSummary) {
        (**self).on_end(summary)
    }

    fn on_error(&mut self, error: &FeedError) {
        (**self).on_error(error)
    }
}

/// Fan out every notification to two handlers, left first
impl<A: RecordHandler, B: RecordHandler> RecordHandler for (A, B) {
    fn on_record(&mut self, record: &str, flow: &mut FlowControl) {
        self.0.on_record(record, flow);
        self.1.on_record(record, flow);
    }

    fn on_end(&mut self, summary: &FeedSummary) {
        self.0.on_end(summary);
        self.1.on_end(summary);
    }

    fn on_error(&mut self, error: &FeedError) {
        self.0.on_error(error);
        self.1.on_error(error);
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingHandler {
    events: Vec<FeedEvent>,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[FeedEvent] {
        &self.events
    }

    pub fn records(&self) -> Vec<&str> {
        self.events.iter().filter_map(FeedEvent::as_record).collect()
    }

    pub fn summary(&self) -> Option<&FeedSummary> {
        self.events.iter().find_map(|event| match event {
            FeedEvent::End(summary) => Some(summary),
            _ => None,
        })
    }

    pub fn error(&self) -> Option<&FeedError> {
        self.events.iter().find_map(|event| match event {
            FeedEvent::Error(error) => Some(error),
            _ => None,
        })
    }

    pub fn into_events(self) -> Vec<FeedEvent> {
        self.events
    }
}

impl RecordHandler for CollectingHandler {
    fn on_record(&mut self, record: &str, _flow: &mut FlowControl) {
        self.events.push(FeedEvent::Record(record.to_string()));
    }

    fn on_end(&mut self, summary: &FeedSummary) {
        self.events.push(FeedEvent::End(summary.clone()));
    }

    fn on_error(&mut self, error: &FeedError) {
        self.events.push(FeedEvent::Error(error.clone()));
    }
}

/// Forwards events into a tokio channel
pub struct ChannelHandler {
    event_sender: mpsc::UnboundedSender<FeedEvent>,
}

impl ChannelHandler {
    /// Create a new channel handler
    pub fn new(event_sender: mpsc::UnboundedSender<FeedEvent>) -> Self {
        Self { event_sender }
    }

    /// Create a handler together with the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl RecordHandler for ChannelHandler {
    fn on_record(&mut self, record: &str, flow: &mut FlowControl) {
        if self
            .event_sender
            .send(FeedEvent::Record(record.to_string()))
            .is_err()
        {
            tracing::warn!("Record receiver dropped; destroying feed");
            flow.destroy();
        }
    }

    fn on_end(&mut self, summary: &FeedSummary) {
        let _ = self.event_sender.send(FeedEvent::End(summary.clone()));
    }

    fn on_error(&mut self, error: &FeedError) {
        let _ = self.event_sender.send(FeedEvent::Error(error.clone()));
    }
}

/// Simple logging handler for debugging
pub struct LoggingHandler {
    prefix: String,
}

impl LoggingHandler {
    /// Create a new logging handler
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl RecordHandler for LoggingHandler {
    fn on_record(&mut self, record: &str, _flow: &mut FlowControl) {
        tracing::debug!("{} record: {}", self.prefix, record);
    }

    fn on_end(&mut self, summary: &FeedSummary) {
        tracing::debug!(
            "{} ended after {} records (complete: {})",
            self.prefix,
            summary.records,
            summary.complete
        );
    }

    fn on_error(&mut self, error: &FeedError) {
        tracing::error!("{} error: {}", self.prefix, error);
    }
}

/// Writes each record followed by a newline
///
/// A write failure destroys the stream; the error is kept for the caller.
pub struct WriterHandler<W: Write> {
    writer: W,
    io_error: Option<std::io::Error>,
    summary: Option<FeedSummary>,
}

impl<W: Write> WriterHandler<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            io_error: None,
            summary: None,
        }
    }

    pub fn summary(&self) -> Option<&FeedSummary> {
        self.summary.as_ref()
    }

    pub fn take_io_error(&mut self) -> Option<std::io::Error> {
        self.io_error.take()
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn record_failure(&mut self, error: std::io::Error) {
        tracing::warn!("Failed to write record: {}", error);
        if self.io_error.is_none() {
            self.io_error = Some(error);
        }
    }
}

impl<W: Write> RecordHandler for WriterHandler<W> {
    fn on_record(&mut self, record: &str, flow: &mut FlowControl) {
        if let Err(e) = writeln!(self.writer, "{record}") {
            self.record_failure(e);
            flow.destroy();
        }
    }

    fn on_end(&mut self, summary: &FeedSummary) {
        if let Err(e) = self.writer.flush() {
            self.record_failure(e);
        }
        self.summary = Some(summary.clone());
    }

    fn on_error(&mut self, _error: &FeedError) {
        let _ = self.writer.flush();
    }
}
