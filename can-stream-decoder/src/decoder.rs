//! Main decoder API
//!
//! This module provides the primary interface for the decoder library.
//! The FrameDecoder struct is the entry point for loading signal definitions
//! and turning raw serial frames into decoded frames.

use crate::layout::{format_hex_id, FrameLayout};
use crate::signals::dbc::parse_dbc_file;
use crate::signals::{DecodedMessage, SignalDatabase};
use crate::types::{DecodedFrame, DecoderError, RawFrame, Result};
use std::path::Path;

/// The main decoder struct - entry point for all decoding operations
pub struct FrameDecoder {
    /// Internal signal database (loaded from DBC files)
    signal_db: SignalDatabase,
}

impl FrameDecoder {
    /// Create a new decoder instance
    pub fn new() -> Self {
        Self {
            signal_db: SignalDatabase::new(),
        }
    }

    /// Create a decoder over an already populated signal database
    pub fn with_database(signal_db: SignalDatabase) -> Self {
        Self { signal_db }
    }

    /// Load a DBC file and add its definitions to the signal database
    ///
    /// # Arguments
    /// * `path` - Path to the DBC file
    ///
    /// # Returns
    /// * `Result<()>` - Ok if loaded successfully, Err if parsing failed
    ///
    /// # Example
    /// ```no_run
    /// use can_stream_decoder::FrameDecoder;
    /// use std::path::Path;
    ///
    /// let mut decoder = FrameDecoder::new();
    /// decoder.add_dbc(Path::new("brightside.dbc")).unwrap();
    /// ```
    pub fn add_dbc(&mut self, path: &Path) -> Result<()> {
        log::info!("Loading DBC file: {:?}", path);

        let messages = parse_dbc_file(path)?;
        for message in messages {
            self.signal_db.add_message(message);
        }

        log::info!("DBC file loaded successfully: {:?}", path);
        Ok(())
    }

    /// Decode one raw frame
    ///
    /// Each layout in [`FrameLayout::PRIORITY`] is tried in turn; the first
    /// one whose split and signal decode both succeed wins. If every layout
    /// fails, the error carries the failure of each attempt.
    ///
    /// # Example
    /// ```no_run
    /// use can_stream_decoder::{FrameDecoder, StreamCursor};
    /// use std::path::Path;
    ///
    /// let mut decoder = FrameDecoder::new();
    /// decoder.add_dbc(Path::new("brightside.dbc")).unwrap();
    ///
    /// let mut cursor = StreamCursor::new();
    /// for frame in cursor.feed(&[0x00, 0x0a]) {
    ///     match decoder.decode_frame(&frame) {
    ///         Ok(decoded) => println!("{}", decoded),
    ///         Err(e) => eprintln!("Dropped frame: {}", e),
    ///     }
    /// }
    /// ```
    pub fn decode_frame(&self, frame: &RawFrame) -> Result<DecodedFrame> {
        let mut failures = Vec::new();

        for layout in FrameLayout::PRIORITY {
            match self.decode_with_layout(frame, layout) {
                Ok(decoded) => return Ok(decoded),
                Err(e) => {
                    log::trace!("Layout {} rejected frame {}: {}", layout, frame.hex(), e);
                    failures.push((layout, e));
                }
            }
        }

        Err(DecoderError::NoMatchingLayout(failures))
    }

    /// Decode one raw frame under a single layout
    pub fn decode_with_layout(&self, frame: &RawFrame, layout: FrameLayout) -> Result<DecodedFrame> {
        let fields = layout.split(frame)?;
        let DecodedMessage {
            name,
            source,
            signals,
        } = self.signal_db.decode(fields.can_id, &fields.payload)?;

        Ok(DecodedFrame {
            source,
            message_class: name,
            can_id: fields.can_id,
            hex_id: format_hex_id(fields.can_id),
            signals,
            timestamp_seconds: fields.timestamp_seconds,
            raw_hex: frame.hex(),
            layout,
        })
    }

    /// Access the underlying signal database
    pub fn database(&self) -> &SignalDatabase {
        &self.signal_db
    }

    /// Get statistics about the loaded signal database
    pub fn database_stats(&self) -> DatabaseStats {
        self.signal_db.stats()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// Re-export DatabaseStats for public API
pub use crate::signals::DatabaseStats;
