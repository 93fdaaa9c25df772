//! Ingestion loop
//!
//! Reads chunks from a [`ByteSource`], resynchronizes them into frames,
//! decodes each frame and hands it to the [`TelemetryWriter`]. Everything
//! runs on one thread; the only shared state is the [`ShutdownSignal`] flag,
//! which is checked between read cycles.

use crate::heartbeat::Heartbeat;
use crate::influx::TimeSeriesClient;
use crate::source::ByteSource;
use crate::writer::{FlushOutcome, TelemetryWriter, WriterStats};
use anyhow::{Context, Result};
use can_stream_decoder::{FrameDecoder, RawFrame, StreamCursor};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative stop request shared with the signal handler
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal that SIGINT and SIGTERM will trip
    pub fn install() -> Result<Self> {
        let signal = Self::new();
        let handle = signal.clone();
        ctrlc::set_handler(move || {
            log::info!("Received shutdown signal, finishing current cycle...");
            handle.request();
        })
        .context("Failed to install signal handler")?;
        Ok(signal)
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Loop tuning
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// Maximum bytes requested per read
    pub chunk_size: usize,
    pub heartbeat_interval: Duration,
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub chunks_read: u64,
    pub bytes_read: u64,
    pub frames: u64,
    pub frames_decoded: u64,
    pub decode_errors: u64,
    pub enqueue_errors: u64,
    pub dropped_segments: u64,
    /// Points handed to the store by idle-poll flushes
    pub idle_flushed: u64,
    pub writer: WriterStats,
}

pub struct Ingestor<S: ByteSource, C: TimeSeriesClient> {
    source: S,
    cursor: StreamCursor,
    decoder: FrameDecoder,
    writer: TelemetryWriter<C>,
    heartbeat: Heartbeat,
    shutdown: ShutdownSignal,
    chunk_size: usize,
    stats: IngestStats,
}

impl<S: ByteSource, C: TimeSeriesClient> Ingestor<S, C> {
    pub fn new(
        source: S,
        decoder: FrameDecoder,
        writer: TelemetryWriter<C>,
        shutdown: ShutdownSignal,
        settings: LoopSettings,
    ) -> Self {
        Self {
            source,
            cursor: StreamCursor::new(),
            decoder,
            writer,
            heartbeat: Heartbeat::new(settings.heartbeat_interval),
            shutdown,
            chunk_size: settings.chunk_size,
            stats: IngestStats::default(),
        }
    }

    /// Run until shutdown is requested or the source fails
    ///
    /// The writer is shut down on both paths, so buffered points get one
    /// final flush. A source failure is returned after that.
    pub fn run(mut self) -> Result<IngestStats> {
        while !self.shutdown.is_requested() {
            if let Err(e) = self.cycle() {
                log::error!("Serial read failed: {}", e);
                self.finish();
                return Err(e).context("Reading serial stream failed");
            }
        }

        Ok(self.finish())
    }

    /// One read and everything it produces
    fn cycle(&mut self) -> io::Result<()> {
        let chunk = self.source.poll(self.chunk_size)?;

        if chunk.is_empty() {
            let outcome = self.writer.maybe_flush(false);
            if let FlushOutcome::Written(n) | FlushOutcome::Failed(n) = outcome {
                self.stats.idle_flushed += n as u64;
            }
            if let Some(beat) = self.heartbeat.tick(self.writer.buffered()) {
                log::info!("ingest={} buf={}", beat.ingested, beat.buffered);
            }
            return Ok(());
        }

        self.stats.chunks_read += 1;
        self.stats.bytes_read += chunk.len() as u64;

        for frame in self.cursor.feed(&chunk) {
            self.process_frame(&frame);
        }
        Ok(())
    }

    fn process_frame(&mut self, frame: &RawFrame) {
        self.stats.frames += 1;

        let decoded = match self.decoder.decode_frame(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.stats.decode_errors += 1;
                log::error!("Dropping frame {}: {}", frame.hex(), e);
                return;
            }
        };

        self.stats.frames_decoded += 1;
        self.heartbeat.record();
        log::debug!("{}", decoded);

        if let Err(e) = self.writer.enqueue(&decoded) {
            self.stats.enqueue_errors += 1;
            log::error!("Dropping frame {}: {}", decoded.hex_id, e);
        }
        self.writer.maybe_flush(false);
    }

    fn finish(mut self) -> IngestStats {
        self.stats.dropped_segments = self.cursor.dropped();
        self.stats.writer = self.writer.shutdown();
        log::info!(
            "Ingestion stopped: {} frames decoded, {} dropped, {} segments discarded, {} points flushed while idle",
            self.stats.frames_decoded,
            self.stats.decode_errors + self.stats.enqueue_errors,
            self.stats.dropped_segments,
            self.stats.idle_flushed
        );
        self.stats
    }
}
