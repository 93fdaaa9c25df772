//! DBC file parser
//!
//! Parses Vector DBC files and converts them into our internal signal database format.

use crate::signals::database::{
    ByteOrder, MessageDefinition, MultiplexerInfo, SignalDefinition, ValueType,
};
use crate::types::{DecoderError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Mask selecting the 29-bit frame identifier; DBC files flag extended
/// identifiers by setting bit 31.
pub const CAN_ID_MASK: u32 = 0x1FFF_FFFF;

/// Parse a DBC file and return message definitions
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    // Read the DBC file as bytes first (handle non-UTF8 encodings)
    let bytes = std::fs::read(path)?;

    // Try UTF-8 first, then fallback to Latin-1/Windows-1252 encoding
    let dbc_content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    // Parse using can-dbc crate
    let dbc = can_dbc::DBC::from_slice(dbc_content.as_bytes()).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to parse DBC file {:?}: {:?}", path, e))
    })?;

    let source_filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc")
        .to_string();

    // Convert to our internal format
    let mut messages = Vec::new();

    for dbc_msg in dbc.messages() {
        let message = convert_message(&dbc, dbc_msg, &source_filename)?;
        messages.push(message);
    }

    log::info!(
        "Parsed {} messages from {:?}",
        messages.len(),
        path
    );

    Ok(messages)
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(
    dbc: &can_dbc::DBC,
    dbc_msg: &can_dbc::Message,
    source: &str,
) -> Result<MessageDefinition> {
    let mut signals = Vec::new();
    let mut is_multiplexed = false;
    let mut multiplexer_signal_name: Option<String> = None;

    // First pass: identify multiplexer signal
    for dbc_sig in dbc_msg.signals() {
        if let can_dbc::MultiplexIndicator::Multiplexor = dbc_sig.multiplexer_indicator() {
            is_multiplexed = true;
            multiplexer_signal_name = Some(dbc_sig.name().to_string());
            break;
        } else if matches!(
            dbc_sig.multiplexer_indicator(),
            can_dbc::MultiplexIndicator::MultiplexedSignal(_)
        ) {
            is_multiplexed = true;
        }
    }

    // Second pass: convert all signals
    let message_id = can_dbc::MessageId(dbc_msg.message_id().0);
    for dbc_sig in dbc_msg.signals() {
        let value_table = dbc
            .value_descriptions_for_signal(message_id.clone(), dbc_sig.name())
            .map(convert_value_table);
        let signal = convert_signal(dbc_sig, multiplexer_signal_name.as_deref(), value_table)?;
        signals.push(signal);
    }

    let senders = match dbc_msg.transmitter() {
        can_dbc::Transmitter::NodeName(name) => vec![name.to_string()],
        _ => Vec::new(),
    };

    Ok(MessageDefinition {
        id: dbc_msg.message_id().0 & CAN_ID_MASK,
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        senders,
        signals,
        is_multiplexed,
        multiplexer_signal: multiplexer_signal_name,
        source: source.to_string(),
    })
}

/// Convert `VAL_` entries to a raw value -> description table
fn convert_value_table(descriptions: &[can_dbc::ValDescription]) -> HashMap<i64, String> {
    descriptions
        .iter()
        .map(|desc| (*desc.a() as i64, desc.b().to_string()))
        .collect()
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(
    dbc_sig: &can_dbc::Signal,
    multiplexer_signal_name: Option<&str>,
    value_table: Option<HashMap<i64, String>>,
) -> Result<SignalDefinition> {
    // Determine byte order
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    // Determine value type
    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    // Handle multiplexer information
    let multiplexer_info = match *dbc_sig.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::MultiplexedSignal(switch_value) => {
            Some(MultiplexerInfo {
                multiplexer_signal: multiplexer_signal_name
                    .ok_or_else(|| {
                        DecoderError::InvalidSignalDefinition(format!(
                            "Multiplexed signal '{}' but no multiplexer found",
                            dbc_sig.name()
                        ))
                    })?
                    .to_string(),
                multiplexer_values: vec![switch_value as u64],  // switch_value is already u64
            })
        }
        _ => None,
    };

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length: *dbc_sig.signal_size() as u16,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
        value_table,
        multiplexer_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_dbc(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_simple_dbc() {
        let dbc_content = r#"
VERSION ""

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_

BS_:

BU_: BMS MCU

BO_ 1570 PackStatus: 8 BMS
 SG_ PackVoltage : 0|16@1+ (0.01,0) [0|655.35] "V" MCU
 SG_ PackTemp : 16|8@1+ (1,-40) [-40|215] "C" MCU

BO_ 1025 MotorDrive: 8 Vector__XXX
 SG_ MotorCurrent : 0|16@1- (0.1,0) [-3276.8|3276.7] "A" BMS
"#;

        let temp_file = write_dbc(dbc_content);
        let messages = parse_dbc_file(temp_file.path()).unwrap();

        assert_eq!(messages.len(), 2);

        let pack = &messages[0];
        assert_eq!(pack.id, 0x622);
        assert_eq!(pack.name, "PackStatus");
        assert_eq!(pack.size, 8);
        assert_eq!(pack.senders, vec!["BMS".to_string()]);
        assert_eq!(pack.source_name(), "BMS");
        assert_eq!(pack.signals.len(), 2);

        let voltage = &pack.signals[0];
        assert_eq!(voltage.name, "PackVoltage");
        assert_eq!(voltage.start_bit, 0);
        assert_eq!(voltage.length, 16);
        assert_eq!(voltage.factor, 0.01);
        assert_eq!(voltage.unit, Some("V".to_string()));

        // Vector__XXX means no declared sender
        let motor = &messages[1];
        assert!(motor.senders.is_empty());
        assert_eq!(motor.source_name(), "UNKNOWN");
        assert_eq!(motor.signals[0].value_type, ValueType::Signed);
    }

    #[test]
    fn test_extended_id_flag_is_masked() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: TEL

BO_ 2147484672 GpsFix: 8 TEL
 SG_ Satellites : 0|8@1+ (1,0) [0|255] "" TEL
"#;

        let temp_file = write_dbc(dbc_content);
        let messages = parse_dbc_file(temp_file.path()).unwrap();

        // 2147484672 = 0x80000400
        assert_eq!(messages[0].id, 0x400);
    }

    #[test]
    fn test_parse_value_table() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: MCU

BO_ 1281 MotorState: 8 MCU
 SG_ DriveMode : 0|2@1+ (1,0) [0|3] "" MCU
 SG_ Rpm : 8|16@1+ (1,0) [0|65535] "rpm" MCU

VAL_ 1281 DriveMode 0 "Neutral" 1 "Drive" 2 "Reverse" ;
"#;

        let temp_file = write_dbc(dbc_content);
        let messages = parse_dbc_file(temp_file.path()).unwrap();

        let mode = &messages[0].signals[0];
        let table = mode.value_table.as_ref().unwrap();
        assert_eq!(table.get(&1), Some(&"Drive".to_string()));
        assert_eq!(table.len(), 3);

        assert!(messages[0].signals[1].value_table.is_none());
    }

    #[test]
    fn test_parse_multiplexed_signals() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: ECU1

BO_ 512 MultiplexedMsg: 8 ECU1
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" ECU1
 SG_ SignalA m0 : 8|16@1+ (1,0) [0|100] "%" ECU1
 SG_ SignalB m1 : 8|16@1+ (0.1,0) [0|1000] "mV" ECU1
"#;

        let temp_file = write_dbc(dbc_content);
        let messages = parse_dbc_file(temp_file.path()).unwrap();

        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert!(msg.is_multiplexed);
        assert_eq!(msg.multiplexer_signal, Some("Mode".to_string()));
        assert_eq!(msg.signals.len(), 3);

        let sig_a = msg.signals.iter().find(|s| s.name == "SignalA").unwrap();
        assert_eq!(
            sig_a.multiplexer_info.as_ref().unwrap().multiplexer_signal,
            "Mode"
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = parse_dbc_file(Path::new("/nonexistent/brightside.dbc")).unwrap_err();
        assert!(matches!(
            err,
            DecoderError::IoError(ref e) if e.kind() == std::io::ErrorKind::NotFound
        ));
    }
}
