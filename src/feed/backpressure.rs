//! Backpressure management for record delivery
//!
//! Records are always appended to the queue. While the consumer is ready the
//! stream pops them straight back off in the same call, so the queue is only
//! ever non-empty while paused.

use std::collections::VecDeque;

/// FIFO of extracted records plus the consumer readiness flag
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    queue: VecDeque<String>,
    paused: bool,
    high_water: usize,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: String) {
        self.queue.push_back(record);
        if self.queue.len() > self.high_water {
            self.high_water = self.queue.len();
        }
        if self.paused {
            tracing::trace!(queued = self.queue.len(), "Holding record while paused");
        }
    }

    /// Next record to deliver, or `None` when empty or paused
    pub fn pop_ready(&mut self) -> Option<String> {
        if self.paused {
            return None;
        }
        self.queue.pop_front()
    }

    /// Returns false if already paused
    pub fn pause(&mut self) -> bool {
        if self.paused {
            return false;
        }
        self.paused = true;
        true
    }

    /// Returns false if not paused
    pub fn resume(&mut self) -> bool {
        if !self.paused {
            return false;
        }
        self.paused = false;
        if !self.queue.is_empty() {
            tracing::debug!(queued = self.queue.len(), "Flushing held records");
        }
        true
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Largest number of records held at once
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Discard every held record
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}
