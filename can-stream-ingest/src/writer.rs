//! Batched telemetry writer
//!
//! Converts decoded frames to points, buffers them, and hands whole batches
//! to a [`TimeSeriesClient`]. A failed batch is logged and discarded; the
//! writer never retries on its own.

use crate::buffer::BatchBuffer;
use crate::influx::{TimeSeriesClient, WriteError, WriteOptions};
use crate::point::{points_for_frame, Point, TimePolicy};
use can_stream_decoder::DecodedFrame;
use chrono::Utc;

/// Result of one flush check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was due, or the buffer was empty
    Idle,
    /// A batch of this many points was written
    Written(usize),
    /// A batch of this many points failed and was discarded
    Failed(usize),
}

/// Counters kept over the writer's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub points_enqueued: u64,
    pub points_written: u64,
    pub points_discarded: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
}

pub struct TelemetryWriter<C: TimeSeriesClient> {
    client: C,
    buffer: BatchBuffer<Point>,
    time_policy: TimePolicy,
    stats: WriterStats,
}

impl<C: TimeSeriesClient> TelemetryWriter<C> {
    pub fn new(client: C, options: &WriteOptions, time_policy: TimePolicy) -> Self {
        Self {
            client,
            buffer: BatchBuffer::new(options.batch_size, options.flush_interval()),
            time_policy,
            stats: WriterStats::default(),
        }
    }

    /// Buffer the points of one frame without any I/O
    ///
    /// Returns the number of points added. Frames without numeric signals
    /// add nothing.
    pub fn enqueue(&mut self, frame: &DecodedFrame) -> Result<usize, WriteError> {
        let points = points_for_frame(frame, self.time_policy, Utc::now())?;
        let count = points.len();
        for point in points {
            self.buffer.push(point);
        }
        self.stats.points_enqueued += count as u64;
        Ok(count)
    }

    /// Write the whole buffer if a flush is due
    pub fn maybe_flush(&mut self, force: bool) -> FlushOutcome {
        if !self.buffer.is_due(force) || self.buffer.is_empty() {
            return FlushOutcome::Idle;
        }

        let batch = self.buffer.take();
        match self.client.write(&batch) {
            Ok(()) => {
                self.stats.points_written += batch.len() as u64;
                self.stats.batches_written += 1;
                log::debug!("Flushed {} points", batch.len());
                FlushOutcome::Written(batch.len())
            }
            Err(e) => {
                self.stats.points_discarded += batch.len() as u64;
                self.stats.batches_failed += 1;
                log::warn!("Batch write failed (size={}): {}", batch.len(), e);
                FlushOutcome::Failed(batch.len())
            }
        }
    }

    /// Final flush, then flush and close the client
    ///
    /// Consumes the writer, so it can only run once. Client errors are
    /// logged; close is attempted even when the flushes fail.
    pub fn shutdown(mut self) -> WriterStats {
        self.maybe_flush(true);

        if let Err(e) = self.client.flush() {
            log::warn!("Client flush failed during shutdown: {}", e);
        }
        if let Err(e) = self.client.close() {
            log::warn!("Client close failed during shutdown: {}", e);
        }

        log::info!(
            "Writer closed: {} of {} points written in {} batches, {} discarded in {} failed batches",
            self.stats.points_written,
            self.stats.points_enqueued,
            self.stats.batches_written,
            self.stats.points_discarded,
            self.stats.batches_failed
        );
        self.stats
    }

    /// Number of points waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
