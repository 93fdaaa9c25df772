//! Known byte layouts of a serial CAN frame
//!
//! The board emits the same logical frame in two undocumented shapes: with a
//! one-byte filler between the timestamp and the identifier, and without it.
//! Each layout is a pure split of a [`RawFrame`] into its sub-fields; the frame
//! decoder tries them in [`FrameLayout::PRIORITY`] order.

use crate::timestamp::{decode_timestamp, TIMESTAMP_LEN};
use crate::types::{DecoderError, RawFrame, Result};
use std::fmt;
use std::ops::Range;

/// Width of the identifier field in bytes
pub const ID_LEN: usize = 4;

/// Width of the payload field in bytes
pub const PAYLOAD_LEN: usize = 8;

/// Byte layout of a serial CAN frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameLayout {
    /// `ts[0..8] filler[8] id[9..13] payload[13..21]`
    WithFiller,
    /// `ts[0..8] id[8..12] payload[12..20]`
    NoFiller,
}

/// Sub-fields extracted from a raw frame by one layout
#[derive(Debug, Clone, PartialEq)]
pub struct FrameFields {
    /// Decoded timestamp, seconds since epoch
    pub timestamp_seconds: f64,
    /// CAN identifier (big-endian on the wire)
    pub can_id: u32,
    /// Payload bytes, at most [`PAYLOAD_LEN`]
    pub payload: Vec<u8>,
}

impl FrameLayout {
    /// Layouts in the order they are attempted; the first match wins
    pub const PRIORITY: [FrameLayout; 2] = [FrameLayout::WithFiller, FrameLayout::NoFiller];

    fn id_offset(&self) -> usize {
        match self {
            FrameLayout::WithFiller => TIMESTAMP_LEN + 1,
            FrameLayout::NoFiller => TIMESTAMP_LEN,
        }
    }

    /// Byte range of the identifier field
    pub fn id_range(&self) -> Range<usize> {
        let start = self.id_offset();
        start..start + ID_LEN
    }

    /// Byte range of the payload field
    pub fn payload_range(&self) -> Range<usize> {
        let start = self.id_offset() + ID_LEN;
        start..start + PAYLOAD_LEN
    }

    /// Split a raw frame into timestamp, identifier and payload
    ///
    /// Ranges running past the end of a short frame are truncated; the
    /// timestamp must still be 8 bytes and the identifier 4 bytes.
    pub fn split(&self, frame: &RawFrame) -> Result<FrameFields> {
        let bytes = frame.as_bytes();

        let timestamp_seconds = decode_timestamp(clamped(bytes, 0..TIMESTAMP_LEN))?;

        let id_range = self.id_range();
        let id_bytes = clamped(bytes, id_range.clone());
        if id_bytes.len() != ID_LEN {
            return Err(DecoderError::FrameTooShort {
                layout: *self,
                needed: id_range.end,
                actual: bytes.len(),
            });
        }
        let can_id = u32::from_be_bytes([id_bytes[0], id_bytes[1], id_bytes[2], id_bytes[3]]);

        let payload = clamped(bytes, self.payload_range()).to_vec();

        Ok(FrameFields {
            timestamp_seconds,
            can_id,
            payload,
        })
    }
}

impl fmt::Display for FrameLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameLayout::WithFiller => write!(f, "with_filler"),
            FrameLayout::NoFiller => write!(f, "no_filler"),
        }
    }
}

fn clamped(bytes: &[u8], range: Range<usize>) -> &[u8] {
    let end = range.end.min(bytes.len());
    let start = range.start.min(end);
    &bytes[start..end]
}

/// Render a CAN identifier as `0x` followed by uppercase hex digits
pub fn format_hex_id(can_id: u32) -> String {
    format!("0x{:X}", can_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: f64, filler: Option<u8>, id: u32, payload: &[u8]) -> RawFrame {
        let mut bytes = ts.to_be_bytes().to_vec();
        if let Some(f) = filler {
            bytes.push(f);
        }
        bytes.extend_from_slice(&id.to_be_bytes());
        bytes.extend_from_slice(payload);
        RawFrame::new(bytes)
    }

    #[test]
    fn test_with_filler_split() {
        let raw = frame(12.5, Some(0xAA), 0x622, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(raw.len(), 21);

        let fields = FrameLayout::WithFiller.split(&raw).unwrap();
        assert_eq!(fields.timestamp_seconds, 12.5);
        assert_eq!(fields.can_id, 0x622);
        assert_eq!(fields.payload, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_no_filler_split() {
        let raw = frame(12.5, None, 0x401, &[9, 8, 7, 6, 5, 4, 3, 2, 0xFF]);

        let fields = FrameLayout::NoFiller.split(&raw).unwrap();
        assert_eq!(fields.can_id, 0x401);
        assert_eq!(fields.payload, vec![9, 8, 7, 6, 5, 4, 3, 2]);

        // Same bytes read with a filler shift land on a different identifier
        let shifted = FrameLayout::WithFiller.split(&raw).unwrap();
        assert_ne!(shifted.can_id, 0x401);
    }

    #[test]
    fn test_short_frame_truncates_payload() {
        // 17 bytes: a short serial frame including its CR-LF terminator
        let mut bytes = 1.0f64.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x06, 0x22, 0x11, 0x22, 0x0d, 0x0a]);
        let raw = RawFrame::new(bytes);

        let fields = FrameLayout::WithFiller.split(&raw).unwrap();
        assert_eq!(raw.len(), 17);
        assert_eq!(fields.can_id, 0x622);
        assert_eq!(fields.payload, vec![0x11, 0x22, 0x0d, 0x0a]);
    }

    #[test]
    fn test_frame_too_short_for_identifier() {
        let raw = RawFrame::new(vec![0u8; 11]);
        let err = FrameLayout::WithFiller.split(&raw).unwrap_err();
        assert!(matches!(
            err,
            DecoderError::FrameTooShort { needed: 13, actual: 11, .. }
        ));

        assert!(FrameLayout::NoFiller.split(&RawFrame::new(vec![0u8; 4])).is_err());
    }

    #[test]
    fn test_ranges_and_names() {
        assert_eq!(FrameLayout::WithFiller.id_range(), 9..13);
        assert_eq!(FrameLayout::WithFiller.payload_range(), 13..21);
        assert_eq!(FrameLayout::NoFiller.id_range(), 8..12);
        assert_eq!(FrameLayout::NoFiller.payload_range(), 12..20);
        assert_eq!(FrameLayout::WithFiller.to_string(), "with_filler");
        assert_eq!(FrameLayout::NoFiller.to_string(), "no_filler");
    }

    #[test]
    fn test_format_hex_id() {
        assert_eq!(format_hex_id(0x622), "0x622");
        assert_eq!(format_hex_id(0x1ABCDEF), "0x1ABCDEF");
        assert_eq!(format_hex_id(0), "0x0");
    }
}
