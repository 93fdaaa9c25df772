//! Message Decoding Engine
//!
//! Extracts signal values from raw CAN payloads based on signal definitions
//! from the signal database. Handles bit extraction, endianness, multiplexing,
//! value tables and physical value conversion.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use crate::types::{DecodedSignal, DecoderError, Result, SignalValue};

/// Message decoder - extracts signals from CAN payloads
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode a payload into the message's signals
    ///
    /// # Arguments
    /// * `data` - Payload bytes
    /// * `message_def` - Message definition from signal database
    ///
    /// # Returns
    /// * `Ok(signals)` with every active signal, in declaration order
    /// * `Err` if the payload is shorter than the declared message size or a
    ///   signal does not fit; no partial result is returned
    pub fn decode_message(data: &[u8], message_def: &MessageDefinition) -> Result<Vec<DecodedSignal>> {
        if data.len() < message_def.size {
            return Err(DecoderError::PayloadLength {
                can_id: message_def.id,
                expected: message_def.size,
                actual: data.len(),
            });
        }

        let mut decoded_signals = Vec::with_capacity(message_def.signals.len());
        let mut multiplexer_value: Option<u64> = None;

        // For multiplexed messages, first extract the multiplexer signal value
        if message_def.is_multiplexed {
            if let Some(ref mux_signal_name) = message_def.multiplexer_signal {
                if let Some(mux_signal) = message_def.signals.iter().find(|s| s.name == *mux_signal_name) {
                    multiplexer_value = Some(Self::extract_signal_value(data, mux_signal)? as u64);
                }
            }
        }

        for signal in &message_def.signals {
            // Skip multiplexed signals not selected by the current multiplexer value
            if let Some(ref mux_info) = signal.multiplexer_info {
                match multiplexer_value {
                    Some(current) if mux_info.multiplexer_values.contains(&current) => {}
                    _ => continue,
                }
            }

            decoded_signals.push(Self::decode_signal(data, signal)?);
        }

        log::trace!(
            "Decoded {} signals from {} (0x{:X})",
            decoded_signals.len(),
            message_def.name,
            message_def.id
        );

        Ok(decoded_signals)
    }

    /// Decode a single signal from payload data
    fn decode_signal(data: &[u8], signal: &SignalDefinition) -> Result<DecodedSignal> {
        let raw_value = Self::extract_signal_value(data, signal)?;

        // Named values from the value table take precedence over scaling
        let description = signal
            .value_table
            .as_ref()
            .and_then(|table| table.get(&raw_value));

        let value = if let Some(text) = description {
            SignalValue::Text(text.clone())
        } else if signal.factor == 1.0 && signal.offset == 0.0 && signal.length == 1 {
            // Boolean signal (single bit, no scaling)
            SignalValue::Boolean(raw_value != 0)
        } else if signal.factor != 1.0 || signal.offset != 0.0 {
            // Scaled signal - use float
            SignalValue::Float(signal.offset + signal.factor * (raw_value as f64))
        } else {
            SignalValue::Integer(raw_value)
        };

        Ok(DecodedSignal {
            name: signal.name.clone(),
            value,
            unit: signal.unit.clone(),
            raw_value,
        })
    }

    /// Extract raw signal value from payload data
    ///
    /// Handles bit extraction with proper endianness and sign extension.
    fn extract_signal_value(data: &[u8], signal: &SignalDefinition) -> Result<i64> {
        let start_bit = signal.start_bit as usize;
        let length = signal.length as usize;

        if length == 0 || length > 64 {
            return Err(DecoderError::InvalidSignalDefinition(format!(
                "Signal '{}' has unsupported length {}",
                signal.name, length
            )));
        }

        let raw_value = match signal.byte_order {
            ByteOrder::LittleEndian => Self::extract_little_endian(data, start_bit, length),
            ByteOrder::BigEndian => Self::extract_big_endian(data, start_bit, length),
        }
        .ok_or_else(|| {
            DecoderError::InvalidData(format!(
                "Signal '{}' does not fit in {} payload bytes",
                signal.name,
                data.len()
            ))
        })?;

        Ok(match signal.value_type {
            ValueType::Unsigned => raw_value as i64,
            ValueType::Signed => Self::sign_extend(raw_value, length),
        })
    }

    /// Extract signal with little-endian (Intel) byte order
    ///
    /// Start bit points to the LSB; bits are numbered LSB-first within each byte.
    fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
        let required_bytes = (start_bit + length + 7) / 8;
        if required_bytes > data.len() {
            return None;
        }

        let mut result: u64 = 0;
        for i in 0..length {
            let bit_pos = start_bit + i;
            let bit_value = (data[bit_pos / 8] >> (bit_pos % 8)) & 0x01;
            result |= (bit_value as u64) << i;
        }

        Some(result)
    }

    /// Extract signal with big-endian (Motorola) byte order
    ///
    /// Start bit points to the MSB using DBC numbering (bit 7 of byte 0 is
    /// bit 7). The signal continues towards the LSB of that byte and then
    /// wraps to the MSB of the next byte.
    fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
        let mut result: u64 = 0;
        let mut bit_pos = start_bit;

        for i in 0..length {
            let byte = data.get(bit_pos / 8)?;
            let bit_value = (byte >> (bit_pos % 8)) & 0x01;
            result = (result << 1) | bit_value as u64;

            if i + 1 < length {
                bit_pos = if bit_pos % 8 == 0 { bit_pos + 15 } else { bit_pos - 1 };
            }
        }

        Some(result)
    }

    /// Sign-extend a value from N bits to 64 bits
    fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::database::MultiplexerInfo;
    use std::collections::HashMap;

    fn signal(name: &str, start_bit: u16, length: u16, byte_order: ByteOrder) -> SignalDefinition {
        SignalDefinition {
            name: name.to_string(),
            start_bit,
            length,
            byte_order,
            value_type: ValueType::Unsigned,
            factor: 1.0,
            offset: 0.0,
            unit: None,
            value_table: None,
            multiplexer_info: None,
        }
    }

    fn message(size: usize, signals: Vec<SignalDefinition>) -> MessageDefinition {
        MessageDefinition {
            id: 0x200,
            name: "Test".to_string(),
            size,
            senders: Vec::new(),
            signals,
            is_multiplexed: false,
            multiplexer_signal: None,
            source: "test.dbc".to_string(),
        }
    }

    #[test]
    fn test_extract_little_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(MessageDecoder::extract_little_endian(&data, 0, 8), Some(0xAB));
    }

    #[test]
    fn test_extract_little_endian_cross_byte() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(MessageDecoder::extract_little_endian(&data, 0, 16), Some(0xCDAB));
    }

    #[test]
    fn test_extract_little_endian_out_of_range() {
        let data = vec![0xAB, 0xCD];
        assert_eq!(MessageDecoder::extract_little_endian(&data, 8, 16), None);
    }

    #[test]
    fn test_extract_big_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(MessageDecoder::extract_big_endian(&data, 7, 8), Some(0xAB));
    }

    #[test]
    fn test_extract_big_endian_cross_byte() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(MessageDecoder::extract_big_endian(&data, 7, 16), Some(0xABCD));
        // 12-bit signal starting at bit 3 of byte 0: low nibble of 0xAB then 0xCD
        assert_eq!(MessageDecoder::extract_big_endian(&data, 3, 12), Some(0xBCD));
    }

    #[test]
    fn test_extract_big_endian_out_of_range() {
        let data = vec![0xAB];
        assert_eq!(MessageDecoder::extract_big_endian(&data, 7, 16), None);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(MessageDecoder::sign_extend(0x7F, 8), 127);
        assert_eq!(MessageDecoder::sign_extend(0xFF, 8), -1);
        assert_eq!(MessageDecoder::sign_extend(0x8000, 16), -32768);
    }

    #[test]
    fn test_decode_value_kinds() {
        let mut scaled = signal("Voltage", 0, 16, ByteOrder::LittleEndian);
        scaled.factor = 0.01;
        let flag = signal("Fault", 16, 1, ByteOrder::LittleEndian);
        let mut mode = signal("Mode", 24, 2, ByteOrder::LittleEndian);
        mode.value_table = Some(HashMap::from([(1, "Drive".to_string())]));
        let count = signal("Count", 32, 8, ByteOrder::LittleEndian);

        let def = message(8, vec![scaled, flag, mode, count]);
        let data = [0x10, 0x27, 0x01, 0x01, 0x05, 0, 0, 0];

        let signals = MessageDecoder::decode_message(&data, &def).unwrap();
        assert_eq!(signals.len(), 4);
        assert_eq!(signals[0].value, SignalValue::Float(100.0));
        assert_eq!(signals[1].value, SignalValue::Boolean(true));
        assert_eq!(signals[2].value, SignalValue::Text("Drive".to_string()));
        assert_eq!(signals[3].value, SignalValue::Integer(5));
    }

    #[test]
    fn test_decode_rejects_short_payload() {
        let def = message(8, vec![signal("A", 0, 8, ByteOrder::LittleEndian)]);
        let err = MessageDecoder::decode_message(&[0x01, 0x02, 0x0d, 0x0a], &def).unwrap_err();
        assert!(matches!(
            err,
            DecoderError::PayloadLength { expected: 8, actual: 4, .. }
        ));
    }

    #[test]
    fn test_decode_multiplexed_selects_active_signals() {
        let mux = signal("Mode", 0, 8, ByteOrder::LittleEndian);
        let mut sig_a = signal("SignalA", 8, 8, ByteOrder::LittleEndian);
        sig_a.multiplexer_info = Some(MultiplexerInfo {
            multiplexer_signal: "Mode".to_string(),
            multiplexer_values: vec![0],
        });
        let mut sig_b = signal("SignalB", 8, 8, ByteOrder::LittleEndian);
        sig_b.multiplexer_info = Some(MultiplexerInfo {
            multiplexer_signal: "Mode".to_string(),
            multiplexer_values: vec![1],
        });

        let mut def = message(2, vec![mux, sig_a, sig_b]);
        def.is_multiplexed = true;
        def.multiplexer_signal = Some("Mode".to_string());

        let signals = MessageDecoder::decode_message(&[1, 42], &def).unwrap();
        let names: Vec<_> = signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Mode", "SignalB"]);
        assert_eq!(signals[1].value, SignalValue::Integer(42));
    }
}
