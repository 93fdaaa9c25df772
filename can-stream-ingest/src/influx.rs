//! InfluxDB v2 client.
//!
//! Writes Line Protocol over the HTTP API:
//! ```text
//! POST {url}/api/v2/write?org=..&bucket=..&precision=ns
//! Authorization: Token {token}
//! ```
//!
//! Retryable failures (transport errors, 429 and 5xx responses) are retried
//! with exponential backoff plus jitter; other responses fail immediately.

use crate::config::InfluxConfig;
use crate::point::Point;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Url;
use std::io::Write;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while writing to the time-series store
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Write failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<WriteError> },

    #[error("Invalid store URL {0}")]
    InvalidUrl(String),

    #[error("Timestamp {0} cannot be represented as a point time")]
    InvalidTimestamp(f64),

    #[error("Client is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WriteError {
    /// True for failures that may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            WriteError::Http(_) => true,
            WriteError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Batching and retry behaviour of the store client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Points per batch, and per HTTP request
    pub batch_size: usize,
    /// Maximum time a point waits in the buffer
    pub flush_interval_ms: u64,
    /// Upper bound of the random delay added to each retry
    pub jitter_ms: u64,
    /// Delay before the first retry
    pub retry_interval_ms: u64,
    pub max_retries: u32,
    pub max_retry_delay_ms: u64,
    pub exponential_base: u32,
    /// Gzip request bodies
    pub gzip: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            flush_interval_ms: 1000,
            jitter_ms: 100,
            retry_interval_ms: 5000,
            max_retries: 5,
            max_retry_delay_ms: 30_000,
            exponential_base: 2,
            gzip: true,
        }
    }
}

impl WriteOptions {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Backoff before retry number `retry` (1-based), jitter excluded
    pub fn backoff_ms(&self, retry: u32) -> u64 {
        let factor = u64::from(self.exponential_base).saturating_pow(retry.saturating_sub(1));
        self.retry_interval_ms
            .saturating_mul(factor)
            .min(self.max_retry_delay_ms)
    }

    fn retry_delay(&self, retry: u32) -> Duration {
        Duration::from_millis(self.backoff_ms(retry) + jitter(self.jitter_ms))
    }
}

/// Random delay in `0..=max_ms`
fn jitter(max_ms: u64) -> u64 {
    fastrand::u64(0..=max_ms)
}

/// A sink for time-series points
pub trait TimeSeriesClient {
    /// Write points, in order
    fn write(&mut self, points: &[Point]) -> Result<(), WriteError>;

    /// Push out anything the client still holds
    fn flush(&mut self) -> Result<(), WriteError>;

    /// Release the client; later writes fail with [`WriteError::Closed`]
    fn close(&mut self) -> Result<(), WriteError>;

    /// Check that the store is reachable
    fn ping(&mut self) -> Result<(), WriteError>;
}

/// Blocking InfluxDB v2 HTTP client
pub struct InfluxClient {
    http: Client,
    url: String,
    org: String,
    bucket: String,
    token: String,
    options: WriteOptions,
    closed: bool,
}

impl InfluxClient {
    pub fn new(config: &InfluxConfig, options: WriteOptions) -> Result<Self, WriteError> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            http,
            url: config.url.trim_end_matches('/').to_string(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
            options,
            closed: false,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn write_url(&self) -> Result<Url, WriteError> {
        Url::parse_with_params(
            &format!("{}/api/v2/write", self.url),
            &[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ],
        )
        .map_err(|e| WriteError::InvalidUrl(format!("{}: {}", self.url, e)))
    }

    /// Request body for one batch of lines
    fn encode_body(&self, lines: &str) -> Result<Vec<u8>, WriteError> {
        if !self.options.gzip {
            return Ok(lines.as_bytes().to_vec());
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(lines.as_bytes())?;
        Ok(encoder.finish()?)
    }

    fn send(&self, body: Vec<u8>) -> Result<(), WriteError> {
        let mut request = self
            .http
            .post(self.write_url()?)
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8");
        if self.options.gzip {
            request = request.header(CONTENT_ENCODING, "gzip");
        }

        let response = request.body(body).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        Err(WriteError::Status {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        })
    }

    fn send_with_retry(&self, lines: &str) -> Result<(), WriteError> {
        let body = self.encode_body(lines)?;
        let mut retry = 0;

        loop {
            match self.send(body.clone()) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && retry < self.options.max_retries => {
                    retry += 1;
                    let delay = self.options.retry_delay(retry);
                    log::debug!(
                        "Write attempt {} failed ({}), retrying in {:?}",
                        retry,
                        e,
                        delay
                    );
                    thread::sleep(delay);
                }
                Err(e) if e.is_retryable() => {
                    return Err(WriteError::RetriesExhausted {
                        attempts: retry + 1,
                        last: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl TimeSeriesClient for InfluxClient {
    fn write(&mut self, points: &[Point]) -> Result<(), WriteError> {
        if self.closed {
            return Err(WriteError::Closed);
        }

        for batch in points.chunks(self.options.batch_size.max(1)) {
            let lines = batch
                .iter()
                .map(Point::to_line_protocol)
                .collect::<Vec<_>>()
                .join("\n");
            self.send_with_retry(&lines)?;
            log::trace!("Wrote {} points to {}", batch.len(), self.bucket);
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        // Writes are synchronous, nothing is held back
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriteError> {
        self.closed = true;
        Ok(())
    }

    fn ping(&mut self) -> Result<(), WriteError> {
        let response = self.http.get(format!("{}/ping", self.url)).send()?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(WriteError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            })
        }
    }
}
