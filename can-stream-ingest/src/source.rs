//! Byte sources feeding the ingestion loop

use anyhow::{Context, Result};
use serialport::SerialPort;
use std::io::{self, Read};
use std::time::Duration;

/// A stream of raw bytes read in bounded chunks
pub trait ByteSource {
    /// Read up to `max` bytes
    ///
    /// An empty vector means "no data right now"; a source never signals
    /// end of stream this way.
    fn poll(&mut self, max: usize) -> io::Result<Vec<u8>>;
}

/// Serial port with a read timeout
pub struct SerialSource {
    port: Box<dyn SerialPort>,
    buffer: Vec<u8>,
}

impl SerialSource {
    /// Open `path` at `baud_rate`; failure here is fatal at startup
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .with_context(|| format!("Failed to open serial port {} @ {}", path, baud_rate))?;

        Ok(Self {
            port,
            buffer: Vec::new(),
        })
    }
}

impl ByteSource for SerialSource {
    fn poll(&mut self, max: usize) -> io::Result<Vec<u8>> {
        self.buffer.resize(max, 0);
        match self.port.read(&mut self.buffer) {
            Ok(n) => Ok(self.buffer[..n].to_vec()),
            Err(e) if is_empty_read(&e) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// Read errors that only mean nothing arrived in time
fn is_empty_read(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Render bytes as space separated lowercase hex pairs
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x00, 0x0a, 0xff, 0x0d]), "00 0a ff 0d");
        assert_eq!(hex_dump(&[]), "");
    }

    #[test]
    fn test_timeouts_are_empty_reads() {
        assert!(is_empty_read(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(is_empty_read(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!is_empty_read(&io::Error::from(io::ErrorKind::BrokenPipe)));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let err = SerialSource::open("/dev/does-not-exist", 230_400, Duration::from_millis(10));
        assert!(err.is_err());
    }
}
