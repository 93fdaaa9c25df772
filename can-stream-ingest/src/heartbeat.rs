//! Periodic throughput log

use std::time::{Duration, Instant};

/// Counts frames ingested since the last beat
pub struct Heartbeat {
    interval: Duration,
    last_beat: Instant,
    ingested: u64,
}

/// What one heartbeat reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beat {
    pub ingested: u64,
    pub buffered: usize,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_beat: Instant::now(),
            ingested: 0,
        }
    }

    /// Count one decoded frame
    pub fn record(&mut self) {
        self.ingested += 1;
    }

    /// Report the count if the interval has elapsed, then reset it
    pub fn tick(&mut self, buffered: usize) -> Option<Beat> {
        if self.last_beat.elapsed() < self.interval {
            return None;
        }

        let beat = Beat {
            ingested: self.ingested,
            buffered,
        };
        self.ingested = 0;
        self.last_beat = Instant::now();
        Some(beat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_reports_and_resets() {
        let mut heartbeat = Heartbeat::new(Duration::ZERO);
        heartbeat.record();
        heartbeat.record();

        assert_eq!(
            heartbeat.tick(5),
            Some(Beat {
                ingested: 2,
                buffered: 5
            })
        );
        assert_eq!(heartbeat.tick(0).map(|b| b.ingested), Some(0));
    }

    #[test]
    fn test_no_beat_before_interval() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(3600));
        heartbeat.record();
        assert_eq!(heartbeat.tick(1), None);
    }
}
