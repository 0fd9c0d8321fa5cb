//! Incremental change feed parsing with flow-controlled delivery
//!
//! Bytes written to a [`ChangesStream`] pass through the long-poll envelope
//! check, then the record splitter, then the delivery queue that honors
//! pause/resume, before reaching the stream's [`RecordHandler`].

pub mod backpressure;
pub mod envelope;
pub mod handler;
pub mod pump;
pub mod splitter;
pub mod stream;
pub mod types;


pub use backpressure::DeliveryQueue;
pub use envelope::{EnvelopeMatcher, EnvelopeProgress, RESULTS_PREFIX};
pub use handler::{
    ChannelHandler, CollectingHandler, FlowControl, LoggingHandler, RecordHandler, WriterHandler,
};
pub use pump::{pump, PumpStats};
pub use splitter::{split_chunks, ArraySplitter, LineSplitter, RecordSplitter, SplitOutcome};
pub use stream::{ChangesStream, FeedSink, FeedSource};
pub use types::{FeedEvent, FeedMode, FeedSummary, StreamState};
