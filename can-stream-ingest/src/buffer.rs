//! Batching buffer for outgoing points.
//!
//! Accumulates items and reports a flush as due either when the batch is
//! full or when the configured time interval has elapsed since the last
//! flush.

use std::time::{Duration, Instant};

/// An ordered batching buffer.
///
/// A flush is due when any of:
/// - the caller forces it
/// - the buffer holds at least `max_size` items
/// - `flush_interval` has elapsed since the last [`take`](Self::take)
pub struct BatchBuffer<T> {
    items: Vec<T>,
    max_size: usize,
    flush_interval: Duration,
    last_flush: Instant,
}

impl<T> BatchBuffer<T> {
    /// Create a new batch buffer.
    ///
    /// # Arguments
    /// - `max_size` - Number of items that makes a flush due
    /// - `flush_interval` - Maximum time between flushes
    pub fn new(max_size: usize, flush_interval: Duration) -> Self {
        Self {
            items: Vec::with_capacity(max_size),
            max_size,
            flush_interval,
            last_flush: Instant::now(),
        }
    }

    /// Append one item.
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Check whether a flush is due.
    ///
    /// This says nothing about whether there is anything to flush.
    pub fn is_due(&self, force: bool) -> bool {
        force
            || self.items.len() >= self.max_size
            || self.last_flush.elapsed() >= self.flush_interval
    }

    /// Take every buffered item and restart the flush clock.
    pub fn take(&mut self) -> Vec<T> {
        self.last_flush = Instant::now();
        std::mem::take(&mut self.items)
    }

    /// Get the current number of buffered items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
