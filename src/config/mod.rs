//! Stream configuration
//!
//! A [`FeedConfig`] is fixed when a stream is constructed. The mode is kept as
//! the raw configured string so that a missing or unknown value surfaces as
//! [`FeedError::InvalidConfiguration`] on the first write rather than at
//! deserialization time.

use crate::error::FeedError;
use crate::feed::FeedMode;
use serde::{Deserialize, Serialize};

/// Default number of trailer bytes kept after the long-poll results array
pub const DEFAULT_TRAILER_LIMIT: usize = 4096;

/// Default read size used by [`crate::feed::pump`]
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Delivery mode, `long-poll` or `continuous`
    #[serde(alias = "feed", skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Maximum number of trailer bytes retained for `last_seq` extraction
    pub trailer_limit: usize,
    /// Buffer size for async readers
    pub read_chunk_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            mode: None,
            trailer_limit: DEFAULT_TRAILER_LIMIT,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl FeedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn long_poll() -> Self {
        Self::default().with_mode(FeedMode::LongPoll.as_str())
    }

    pub fn continuous() -> Self {
        Self::default().with_mode(FeedMode::Continuous.as_str())
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_trailer_limit(mut self, limit: usize) -> Self {
        self.trailer_limit = limit;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Resolve the configured mode
    pub fn mode(&self) -> Result<FeedMode, FeedError> {
        match self.mode.as_deref() {
            Some(value) => value.parse(),
            None => Err(FeedError::missing_mode()),
        }
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, FeedError> {
        toml::from_str(content).map_err(|e| FeedError::config_parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, FeedError> {
        toml::to_string(self).map_err(|e| FeedError::config_parse(e.to_string()))
    }
}
