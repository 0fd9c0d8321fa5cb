//! Core types for change feed streams

use crate::error::FeedError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grammar governing the feed body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedMode {
    /// One JSON document: `{"results":[...],"last_seq":...}`
    LongPoll,
    /// One record per line
    Continuous,
}

impl FeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LongPoll => "long-poll",
            Self::Continuous => "continuous",
        }
    }
}

impl FromStr for FeedMode {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long-poll" | "longpoll" => Ok(Self::LongPoll),
            "continuous" => Ok(Self::Continuous),
            other => Err(FeedError::unknown_mode(other)),
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stream lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// Accepting writes and emitting records
    Open,
    /// Writer finished; queued records may still be delivered
    Ended,
    /// No further events will fire
    Closed,
    /// A fatal parse or configuration error occurred
    Failed,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Ended => "ended",
            Self::Closed => "closed",
            Self::Failed => "failed",
        })
    }
}

/// Completion payload delivered with the end notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSummary {
    /// Records delivered to the handler
    pub records: u64,
    /// Blank keep-alive lines seen in continuous mode
    pub heartbeats: u64,
    /// Sequence marker from the long-poll trailer, when it could be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seq: Option<serde_json::Value>,
    /// Whether the long-poll envelope was closed before the writer ended
    pub complete: bool,
}

impl FeedSummary {
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

/// Notification emitted by a stream
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Record(String),
    End(FeedSummary),
    Error(FeedError),
}

impl FeedEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Record(_))
    }

    pub fn as_record(&self) -> Option<&str> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }
}
