//! Long-poll envelope validation
//!
//! A long-poll body must begin with the exact bytes `{"results":[`. The
//! matcher compares input against that literal one byte at a time, carrying
//! its cursor across writes, and fails on the first divergent byte.

use crate::error::FeedError;

/// Literal that opens a long-poll results array
pub const RESULTS_PREFIX: &[u8] = br#"{"results":["#;

/// Outcome of feeding a chunk to the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeProgress {
    /// Every byte matched but the literal is not complete yet
    Pending,
    /// The literal completed after `consumed` bytes of this chunk
    Open { consumed: usize },
}

#[derive(Debug, Clone, Default)]
pub struct EnvelopeMatcher {
    cursor: usize,
}

impl EnvelopeMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of prefix bytes confirmed so far
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_open(&self) -> bool {
        self.cursor == RESULTS_PREFIX.len()
    }

    /// Match as much of `input` as the remaining prefix requires
    pub fn feed(&mut self, input: &[u8]) -> Result<EnvelopeProgress, FeedError> {
        if self.is_open() {
            return Ok(EnvelopeProgress::Open { consumed: 0 });
        }

        for (index, &found) in input.iter().enumerate() {
            let expected = RESULTS_PREFIX[self.cursor];
            if found != expected {
                tracing::debug!(
                    position = self.cursor,
                    "Envelope mismatch after {} matching bytes",
                    self.cursor
                );
                return Err(FeedError::MalformedEnvelope {
                    position: self.cursor,
                    expected,
                    found,
                });
            }
            self.cursor += 1;
            if self.is_open() {
                tracing::trace!("Long-poll envelope open");
                return Ok(EnvelopeProgress::Open {
                    consumed: index + 1,
                });
            }
        }

        Ok(EnvelopeProgress::Pending)
    }
}
