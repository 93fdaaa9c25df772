//! Unified signal database
//!
//! Combines message definitions from one or more DBC files into a single
//! database keyed by CAN identifier, and exposes the lookup/decode contract
//! the frame decoder relies on.

use crate::message_decoder::MessageDecoder;
use crate::types::{DecodedSignal, DecoderError, Result};
use std::collections::HashMap;

/// Sender name reported for messages that declare no transmitter
pub const UNKNOWN_SOURCE: &str = "UNKNOWN";

/// A complete CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN message ID (29-bit, extended flag removed)
    pub id: u32,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// Declared sender nodes, in declaration order
    pub senders: Vec<String>,
    /// All signals in this message
    pub signals: Vec<SignalDefinition>,
    /// True if this message has multiplexed signals
    pub is_multiplexed: bool,
    /// Multiplexer signal name (if multiplexed)
    pub multiplexer_signal: Option<String>,
    /// Source file (DBC filename)
    pub source: String,
}

impl MessageDefinition {
    /// First declared sender, or [`UNKNOWN_SOURCE`]
    pub fn source_name(&self) -> &str {
        self.senders
            .first()
            .map(String::as_str)
            .unwrap_or(UNKNOWN_SOURCE)
    }
}

/// A CAN signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit in the CAN frame
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    /// Byte order
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Value table for enum-like values (raw_value -> description)
    pub value_table: Option<HashMap<i64, String>>,
    /// Multiplexer info (None if not multiplexed)
    pub multiplexer_info: Option<MultiplexerInfo>,
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Multiplexer information for multiplexed signals
#[derive(Debug, Clone)]
pub struct MultiplexerInfo {
    /// Name of the multiplexer signal that controls this signal
    pub multiplexer_signal: String,
    /// Multiplexer value(s) for which this signal is active
    pub multiplexer_values: Vec<u64>,
}

/// Result of decoding one payload against its message definition
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Message name
    pub name: String,
    /// First declared sender, or [`UNKNOWN_SOURCE`]
    pub source: String,
    /// Decoded signals in declaration order
    pub signals: Vec<DecodedSignal>,
}

/// The unified signal database
pub struct SignalDatabase {
    /// Message definitions by CAN ID; the first file to define an ID wins
    messages: HashMap<u32, MessageDefinition>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
        }
    }

    /// Add a message definition to the database
    ///
    /// A definition for an ID that is already present is ignored.
    pub fn add_message(&mut self, message: MessageDefinition) {
        if let Some(existing) = self.messages.get(&message.id) {
            log::warn!(
                "Ignoring {} (0x{:X}) from {}: already defined as {} by {}",
                message.name,
                message.id,
                message.source,
                existing.name,
                existing.source
            );
            return;
        }
        self.messages.insert(message.id, message);
    }

    /// Get the message definition for a CAN ID
    pub fn get_message(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&can_id)
    }

    /// Look up the message for `can_id`, failing if it is not defined
    pub fn lookup_message(&self, can_id: u32) -> Result<&MessageDefinition> {
        self.get_message(can_id)
            .ok_or(DecoderError::MessageNotFound(can_id))
    }

    /// Decode `payload` against the message defined for `can_id`
    ///
    /// Fails if the identifier is unknown or the payload does not fit the
    /// message's declared layout.
    pub fn decode(&self, can_id: u32, payload: &[u8]) -> Result<DecodedMessage> {
        let message_def = self.lookup_message(can_id)?;
        let signals = MessageDecoder::decode_message(payload, message_def)?;

        Ok(DecodedMessage {
            name: message_def.name.clone(),
            source: message_def.source_name().to_string(),
            signals,
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        let num_messages = self.messages.len();
        let num_signals: usize = self.messages.values().map(|msg| msg.signals.len()).sum();

        DatabaseStats {
            num_messages,
            num_signals,
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}

impl Default for SignalDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalValue;

    fn engine_data(senders: Vec<String>) -> MessageDefinition {
        let signal = SignalDefinition {
            name: "EngineSpeed".to_string(),
            start_bit: 0,
            length: 16,
            byte_order: ByteOrder::LittleEndian,
            value_type: ValueType::Unsigned,
            factor: 1.0,
            offset: 0.0,
            unit: Some("rpm".to_string()),
            value_table: None,
            multiplexer_info: None,
        };

        MessageDefinition {
            id: 0x123,
            name: "EngineData".to_string(),
            size: 8,
            senders,
            signals: vec![signal],
            is_multiplexed: false,
            multiplexer_signal: None,
            source: "test.dbc".to_string(),
        }
    }

    #[test]
    fn test_empty_database() {
        let db = SignalDatabase::new();
        let stats = db.stats();
        assert_eq!(stats.num_messages, 0);
        assert_eq!(stats.num_signals, 0);
        assert!(matches!(
            db.lookup_message(0x123),
            Err(DecoderError::MessageNotFound(0x123))
        ));
    }

    #[test]
    fn test_add_message() {
        let mut db = SignalDatabase::new();
        db.add_message(engine_data(vec!["ECU1".to_string()]));

        let stats = db.stats();
        assert_eq!(stats.num_messages, 1);
        assert_eq!(stats.num_signals, 1);

        let msg = db.get_message(0x123).unwrap();
        assert_eq!(msg.name, "EngineData");
        assert_eq!(msg.signals[0].name, "EngineSpeed");
    }

    #[test]
    fn test_first_definition_of_an_id_wins() {
        let mut db = SignalDatabase::new();
        db.add_message(engine_data(vec!["ECU1".to_string()]));

        let mut other = engine_data(vec!["ECU2".to_string()]);
        other.name = "EngineDataV2".to_string();
        other.source = "other.dbc".to_string();
        db.add_message(other);

        assert_eq!(db.stats().num_messages, 1);
        let msg = db.get_message(0x123).unwrap();
        assert_eq!(msg.name, "EngineData");
        assert_eq!(msg.source, "test.dbc");
    }

    #[test]
    fn test_decode_reports_first_sender() {
        let mut db = SignalDatabase::new();
        db.add_message(engine_data(vec!["ECU1".to_string(), "ECU2".to_string()]));

        let decoded = db.decode(0x123, &[0x10, 0x27, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(decoded.name, "EngineData");
        assert_eq!(decoded.source, "ECU1");
        assert_eq!(decoded.signals.len(), 1);
        assert_eq!(decoded.signals[0].value, SignalValue::Integer(10_000));
    }

    #[test]
    fn test_decode_without_sender_is_unknown() {
        let mut db = SignalDatabase::new();
        db.add_message(engine_data(Vec::new()));

        let decoded = db.decode(0x123, &[0; 8]).unwrap();
        assert_eq!(decoded.source, UNKNOWN_SOURCE);
    }

    #[test]
    fn test_decode_unknown_id_fails() {
        let db = SignalDatabase::new();
        assert!(matches!(
            db.decode(0x7FF, &[0; 8]),
            Err(DecoderError::MessageNotFound(0x7FF))
        ));
    }
}
