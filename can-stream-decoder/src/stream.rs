//! Serial stream resynchronization
//!
//! The board writes frames to the serial link terminated by CR-LF, but the
//! terminator bytes can also occur inside timestamps and payloads, and the
//! transport hands us arbitrary chunks. Resynchronization works on the hex
//! rendering of the stream:
//!
//! 1. strip a leading `000a` (or `0a`) transport artifact from the new chunk
//! 2. prepend the remainder carried over from the previous chunk
//! 3. split on the hex delimiter `0d0a`
//! 4. keep the last segment as the new remainder unless it already has a
//!    valid frame length
//! 5. emit every segment of a valid length, re-terminated and hex-decoded
//! 6. silently drop every other segment
//!
//! Because splitting happens on hex digits, a delimiter match may straddle a
//! byte boundary; the resulting segments have odd or otherwise invalid lengths
//! and are dropped in step 6.

use crate::types::{RawFrame, FRAME_LEN};

/// Hex rendering of the CR-LF frame terminator
pub const DELIMITER: &str = "0d0a";

/// Leading transport artifacts, longest first
pub const SENTINELS: [&str; 2] = ["000a", "0a"];

/// Hex lengths of a complete segment (delimiter excluded)
pub const VALID_SEGMENT_LENGTHS: [usize; 3] = [30, 396, 44];

/// Hex length of a segment carrying several concatenated frames
pub const BLOCK_SEGMENT_LEN: usize = 396;

/// Outcome of one resynchronization step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resync {
    /// Complete frames, in stream order
    pub frames: Vec<RawFrame>,
    /// Undecoded hex digits to carry into the next step
    pub remainder: String,
    /// Segments dropped because their length matched no known frame size
    pub dropped: usize,
}

/// True if `segment` has the length of a complete frame or block
pub fn is_valid_segment(segment: &str) -> bool {
    VALID_SEGMENT_LENGTHS.contains(&segment.len())
}

fn strip_sentinel(chunk_hex: &str) -> &str {
    SENTINELS
        .iter()
        .find_map(|sentinel| chunk_hex.strip_prefix(sentinel))
        .unwrap_or(chunk_hex)
}

/// Resynchronize one chunk of hex-encoded stream data
///
/// `remainder` is the value returned by the previous call (empty at start).
/// An empty chunk yields no frames and returns the remainder unchanged.
pub fn resynchronize(chunk_hex: &str, remainder: &str) -> Resync {
    let message = format!("{}{}", remainder, strip_sentinel(chunk_hex));

    let mut segments: Vec<&str> = message.split(DELIMITER).collect();

    // The trailing segment is still being received unless it is already whole
    let remainder = match segments.last() {
        Some(last) if !is_valid_segment(last) => {
            let last = segments.pop().unwrap_or_default();
            last.to_string()
        }
        _ => String::new(),
    };

    let mut frames = Vec::new();
    let mut dropped = 0;

    for segment in segments {
        if !is_valid_segment(segment) {
            if !segment.is_empty() {
                log::trace!("Dropping {}-digit segment {}", segment.len(), segment);
            }
            dropped += 1;
            continue;
        }

        let bytes = match hex::decode(format!("{}{}", segment, DELIMITER)) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::debug!("Dropping undecodable segment {}: {}", segment, e);
                dropped += 1;
                continue;
            }
        };

        if segment.len() == BLOCK_SEGMENT_LEN {
            frames.extend(
                bytes
                    .chunks_exact(FRAME_LEN)
                    .map(|chunk| RawFrame::new(chunk.to_vec())),
            );
        } else {
            frames.push(RawFrame::new(bytes));
        }
    }

    Resync {
        frames,
        remainder,
        dropped,
    }
}

/// Carry-forward state of the stream resynchronizer
///
/// One cursor exists per serial stream; it is fed every chunk in arrival
/// order and holds the undecoded tail between reads.
#[derive(Debug, Clone, Default)]
pub struct StreamCursor {
    pending: String,
    dropped: u64,
}

impl StreamCursor {
    /// Create a cursor with no pending data
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes read from the transport
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.feed_hex(&hex::encode(chunk))
    }

    /// Feed an already hex-encoded chunk
    pub fn feed_hex(&mut self, chunk_hex: &str) -> Vec<RawFrame> {
        if chunk_hex.is_empty() {
            return Vec::new();
        }

        let resync = resynchronize(chunk_hex, &self.pending);
        self.pending = resync.remainder;
        self.dropped += resync.dropped as u64;
        resync.frames
    }

    /// Hex digits waiting for the rest of their frame
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Total segments dropped since the cursor was created
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Discard pending data
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
