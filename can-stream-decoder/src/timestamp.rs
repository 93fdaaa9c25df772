//! Frame timestamp decoding
//!
//! The board firmware does not pin down how the 8-byte timestamp field is
//! encoded, so the decoder tries each known interpretation in a fixed order
//! and keeps the first one that unpacks. Decoded values are not range checked:
//! any value that unpacks is accepted as-is.

use crate::types::{DecoderError, Result};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

/// Width of the timestamp field in bytes
pub const TIMESTAMP_LEN: usize = 8;

/// Known binary encodings of the timestamp field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampEncoding {
    /// Big-endian IEEE-754 double, seconds since epoch
    Float64,
    /// Big-endian unsigned 64-bit integer, seconds since epoch
    Seconds,
    /// Big-endian unsigned 64-bit integer, milliseconds since epoch
    Millis,
}

impl TimestampEncoding {
    /// Interpretations in the order they are attempted
    pub const PRIORITY: [TimestampEncoding; 3] = [
        TimestampEncoding::Float64,
        TimestampEncoding::Seconds,
        TimestampEncoding::Millis,
    ];

    /// Interpret `field` under this encoding, returning seconds since epoch
    pub fn interpret(&self, field: &[u8]) -> Result<f64> {
        if field.len() != TIMESTAMP_LEN {
            return Err(DecoderError::TimestampDecode(format!(
                "{} needs {} bytes, got {}",
                self,
                TIMESTAMP_LEN,
                field.len()
            )));
        }

        let seconds = match self {
            TimestampEncoding::Float64 => BigEndian::read_f64(field),
            TimestampEncoding::Seconds => BigEndian::read_u64(field) as f64,
            TimestampEncoding::Millis => BigEndian::read_u64(field) as f64 / 1000.0,
        };
        Ok(seconds)
    }
}

impl fmt::Display for TimestampEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampEncoding::Float64 => write!(f, "f64"),
            TimestampEncoding::Seconds => write!(f, "u64 seconds"),
            TimestampEncoding::Millis => write!(f, "u64 milliseconds"),
        }
    }
}

/// Decode an 8-byte timestamp field to seconds since the Unix epoch
///
/// Returns the first interpretation in [`TimestampEncoding::PRIORITY`] that
/// succeeds. When none does, the double interpretation is attempted once more
/// and its error is returned.
pub fn decode_timestamp(field: &[u8]) -> Result<f64> {
    for encoding in TimestampEncoding::PRIORITY {
        match encoding.interpret(field) {
            Ok(seconds) => return Ok(seconds),
            Err(e) => log::trace!("Timestamp not {}: {}", encoding, e),
        }
    }
    TimestampEncoding::Float64.interpret(field)
}
