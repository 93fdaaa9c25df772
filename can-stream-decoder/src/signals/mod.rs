//! Signal database and DBC parser
//!
//! This module contains the parser for signal definition files (DBC)
//! and the unified signal database.

pub mod dbc;
pub mod database;

// Re-export key types for convenience
pub use database::{
    ByteOrder, DatabaseStats, DecodedMessage, MessageDefinition, MultiplexerInfo,
    SignalDatabase, SignalDefinition, ValueType, UNKNOWN_SOURCE,
};
