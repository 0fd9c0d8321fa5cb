//! # changes-feed
//!
//! Incremental parser for CouchDB-style `_changes` responses.
//!
//! Bytes are written to a [`ChangesStream`] in chunks of any size and each
//! change record is handed to a [`RecordHandler`] as soon as its last byte
//! arrives, with pause/resume flow control on the delivery side.
//!
//! ## Usage
//!
//! ```bash
//! changes-feed --mode long-poll changes.json
//! curl -s "$COUCH/db/_changes?feed=continuous" | changes-feed --mode continuous
//! ```
//!
//! ## Modules
//!
//! - `config` - Stream configuration, loadable from TOML
//! - `error` - Error types and numeric error codes
//! - `feed` - Envelope matching, record splitting, and the duplex stream
pub mod config;
pub mod error;
pub mod feed;

#[cfg(test)]
mod property_tests;

pub use config::FeedConfig;
pub use error::{FeedError, FeedErrorKind, PumpError};
pub use feed::{
    ChangesStream, CollectingHandler, FeedEvent, FeedMode, FeedSink, FeedSource, FeedSummary,
    FlowControl, RecordHandler, StreamState,
};
