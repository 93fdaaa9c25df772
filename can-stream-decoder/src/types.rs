//! Core types for the CAN stream decoder library
//!
//! This module defines the fundamental types that flow through the decoding
//! pipeline: raw frames cut out of the serial stream, decoded frames with
//! their physical signal values, and the error type shared by every stage.

use crate::layout::FrameLayout;
use chrono::{DateTime, Local};
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Nominal length of one CAN frame as transmitted over serial:
/// 8 (timestamp) + 1 (filler) + 4 (identifier) + 8 (payload).
pub const FRAME_LEN: usize = 21;

/// Raw frame bytes cut out of the serial stream
///
/// Produced by the stream resynchronizer and consumed once by the frame
/// decoder. The buffer is nominally [`FRAME_LEN`] bytes but short frames are
/// passed through as-is; the layouts decide whether they can be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Vec<u8>,
}

impl RawFrame {
    /// Wrap raw frame bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The frame bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes in the frame
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the frame holds no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercase hex rendering of the frame bytes
    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl From<Vec<u8>> for RawFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Errors that can occur during decoding
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Message not found: CAN ID 0x{0:X}")]
    MessageNotFound(u32),

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Wrong payload size for CAN ID 0x{can_id:X}: expected {expected} bytes, got {actual}")]
    PayloadLength {
        can_id: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to decode timestamp: {0}")]
    TimestampDecode(String),

    #[error("Frame too short for {layout} layout: need {needed} bytes, got {actual}")]
    FrameTooShort {
        layout: FrameLayout,
        needed: usize,
        actual: usize,
    },

    #[error("No frame layout matched: {}", describe_failures(.0))]
    NoMatchingLayout(Vec<(FrameLayout, DecoderError)>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn describe_failures(failures: &[(FrameLayout, DecoderError)]) -> String {
    failures
        .iter()
        .map(|(layout, err)| format!("{}: {}", layout, err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A decoded signal with its current value
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    /// Signal name from the DBC
    pub name: String,
    /// Decoded physical value
    pub value: SignalValue,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Raw value before scaling (useful for debugging)
    pub raw_value: i64,
}

/// Signal value types supported by the decoder
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    /// Signed integer value
    Integer(i64),
    /// Floating-point value (after scaling/offset)
    Float(f64),
    /// Boolean value (single unscaled bit)
    Boolean(bool),
    /// Named value from a DBC value table
    Text(String),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Integer(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{:.3}", v),
            SignalValue::Boolean(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            SignalValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl SignalValue {
    /// Numeric view of the value, `None` for named values
    ///
    /// Booleans map to `1.0` / `0.0`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SignalValue::Integer(v) => Some(*v as f64),
            SignalValue::Float(v) => Some(*v),
            SignalValue::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            SignalValue::Text(_) => None,
        }
    }

    /// Check if this is a boolean value
    pub fn is_boolean(&self) -> bool {
        matches!(self, SignalValue::Boolean(_))
    }
}

/// One successfully decoded frame
///
/// Created once per raw frame that matched a layout and decoded against the
/// signal database. Never partially populated.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// First declared sender of the message, or `"UNKNOWN"`
    pub source: String,
    /// Message name from the DBC
    pub message_class: String,
    /// CAN identifier
    pub can_id: u32,
    /// Identifier rendered as `0x` + uppercase hex
    pub hex_id: String,
    /// Decoded signals in DBC declaration order
    pub signals: Vec<DecodedSignal>,
    /// Timestamp carried in the frame, seconds since the Unix epoch
    pub timestamp_seconds: f64,
    /// Hex rendering of the raw frame bytes
    pub raw_hex: String,
    /// Layout that produced this frame
    pub layout: FrameLayout,
}

impl DecodedFrame {
    /// Frame timestamp as local time, if representable
    pub fn local_time(&self) -> Option<DateTime<Local>> {
        if !self.timestamp_seconds.is_finite() {
            return None;
        }
        let secs = self.timestamp_seconds.floor();
        let nanos = ((self.timestamp_seconds - secs) * 1e9) as u32;
        DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
            .map(|utc| utc.with_timezone(&Local))
    }
}

impl fmt::Display for DecodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = match self.local_time() {
            Some(t) => t.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            None => format!("{}", self.timestamp_seconds),
        };
        write!(
            f,
            "{} {} {} @ {} [{}]",
            self.hex_id, self.source, self.message_class, time, self.layout
        )?;
        for signal in &self.signals {
            write!(f, " {}={}", signal.name, signal.value)?;
            if let Some(unit) = &signal.unit {
                write!(f, "{}", unit)?;
            }
        }
        Ok(())
    }
}
