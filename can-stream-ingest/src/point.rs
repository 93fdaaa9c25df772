//! Time-series points and InfluxDB v2 Line Protocol rendering.
//!
//! Line Protocol format:
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp_ns
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v2/reference/syntax/line-protocol/>

use crate::influx::WriteError;
use can_stream_decoder::DecodedFrame;
use chrono::{DateTime, Utc};
use std::fmt;

/// Field carrying the frame's own timestamp on every signal point
pub const CAN_TIMESTAMP_FIELD: &str = "can_timestamp";

/// Tag carrying the message class on every signal point
pub const CLASS_TAG: &str = "class";

/// Which clock provides the time of a point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePolicy {
    /// Time of enqueueing on the ingest host
    WallClock,
    /// Timestamp decoded from the frame
    CanTimestamp,
}

impl fmt::Display for TimePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimePolicy::WallClock => write!(f, "wall clock"),
            TimePolicy::CanTimestamp => write!(f, "CAN timestamp"),
        }
    }
}

/// One time-series record
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, f64)>,
    /// Nanoseconds since the Unix epoch
    pub timestamp_ns: i64,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp_ns: i64) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp_ns,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    /// Render this point as a single Line Protocol line.
    ///
    /// Tags are written sorted by key; fields keep insertion order.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_measurement(&self.measurement);

        let mut sorted_tags: Vec<_> = self.tags.iter().collect();
        sorted_tags.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (key, value) in sorted_tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_string());
        }

        line.push(' ');
        line.push_str(&self.timestamp_ns.to_string());
        line
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line_protocol())
    }
}

/// Escape measurement name: spaces and commas
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Escape tag keys, tag values and field keys: commas, equals signs and spaces
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// Nanoseconds since the epoch for a fractional-seconds timestamp
fn seconds_to_nanos(seconds: f64) -> Option<i64> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    // Rounding may carry into the next second
    let (secs, nanos) = if nanos >= 1_000_000_000 {
        (whole as i64 + 1, 0)
    } else {
        (whole as i64, nanos)
    };
    DateTime::<Utc>::from_timestamp(secs, nanos).and_then(|t| t.timestamp_nanos_opt())
}

/// Build the points for one decoded frame
///
/// One point per numeric or boolean signal: measurement is the frame's
/// source node, tag `class` is the message class, and the fields are the
/// signal value plus `can_timestamp`. Booleans become 1.0/0.0 and textual
/// values are skipped. A non-finite frame timestamp is left out of the
/// fields, since Line Protocol has no spelling for it.
///
/// Fails with [`WriteError::InvalidTimestamp`] only under
/// [`TimePolicy::CanTimestamp`], when the frame timestamp does not fit a
/// UTC instant.
pub fn points_for_frame(
    frame: &DecodedFrame,
    policy: TimePolicy,
    now: DateTime<Utc>,
) -> Result<Vec<Point>, WriteError> {
    let can_ts = frame.timestamp_seconds;

    let timestamp_ns = match policy {
        TimePolicy::WallClock => now
            .timestamp_nanos_opt()
            .ok_or(WriteError::InvalidTimestamp(can_ts))?,
        TimePolicy::CanTimestamp => {
            seconds_to_nanos(can_ts).ok_or(WriteError::InvalidTimestamp(can_ts))?
        }
    };

    Ok(frame
        .signals
        .iter()
        .filter_map(|signal| {
            let value = signal.value.as_number()?;
            let mut point = Point::new(frame.source.as_str(), timestamp_ns)
                .tag(CLASS_TAG, frame.message_class.as_str())
                .field(signal.name.as_str(), value);
            if can_ts.is_finite() {
                point = point.field(CAN_TIMESTAMP_FIELD, can_ts);
            }
            Some(point)
        })
        .collect())
}
