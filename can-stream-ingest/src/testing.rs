//! In-memory stand-ins for the serial port and the store

use crate::influx::{TimeSeriesClient, WriteError};
use crate::ingest::ShutdownSignal;
use crate::point::Point;
use crate::source::ByteSource;
use can_stream_decoder::{DecodedFrame, DecodedSignal, FrameLayout, SignalValue};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    /// Batch write with this many points
    Write(usize),
    Flush,
    Close,
    Ping,
}

/// Client that records every call; clones share the record
#[derive(Clone, Default)]
pub struct RecordingClient {
    calls: Arc<Mutex<Vec<ClientCall>>>,
    points: Arc<Mutex<Vec<Point>>>,
    fail_writes: bool,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose writes always fail with a server error
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn points(&self) -> Vec<Point> {
        self.points.lock().unwrap().clone()
    }

    fn record(&self, call: ClientCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl TimeSeriesClient for RecordingClient {
    fn write(&mut self, points: &[Point]) -> Result<(), WriteError> {
        self.record(ClientCall::Write(points.len()));
        if self.fail_writes {
            return Err(WriteError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        self.points.lock().unwrap().extend_from_slice(points);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        self.record(ClientCall::Flush);
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriteError> {
        self.record(ClientCall::Close);
        Ok(())
    }

    fn ping(&mut self) -> Result<(), WriteError> {
        self.record(ClientCall::Ping);
        Ok(())
    }
}

/// One scripted step of a [`ScriptedSource`]
pub enum Step {
    /// Result of the next poll
    Read(io::Result<Vec<u8>>),
    /// Sleep before the next read
    Pause(Duration),
}

/// Source replaying scripted reads, then requesting shutdown
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    shutdown: ShutdownSignal,
}

impl ScriptedSource {
    pub fn with_steps(steps: Vec<Step>, shutdown: ShutdownSignal) -> Self {
        Self {
            steps: steps.into(),
            shutdown,
        }
    }
}

impl ByteSource for ScriptedSource {
    fn poll(&mut self, _max: usize) -> io::Result<Vec<u8>> {
        while let Some(step) = self.steps.pop_front() {
            match step {
                Step::Read(read) => return read,
                Step::Pause(delay) => thread::sleep(delay),
            }
        }
        self.shutdown.request();
        Ok(Vec::new())
    }
}

/// A frame with two numeric signals
pub fn decoded_frame(timestamp_seconds: f64) -> DecodedFrame {
    let signal = |name: &str, value| DecodedSignal {
        name: name.to_string(),
        value,
        unit: None,
        raw_value: 0,
    };

    DecodedFrame {
        source: "BMS".to_string(),
        message_class: "PackStatus".to_string(),
        can_id: 0x622,
        hex_id: "0x622".to_string(),
        signals: vec![
            signal("PackVoltage", SignalValue::Float(100.0)),
            signal("Fault", SignalValue::Boolean(false)),
        ],
        timestamp_seconds,
        raw_hex: String::new(),
        layout: FrameLayout::WithFiller,
    }
}
