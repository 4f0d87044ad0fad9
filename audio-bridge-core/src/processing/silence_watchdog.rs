use std::time::{Duration, Instant};

/// Keeps chunk cadence alive while the source delivers nothing.
///
/// When no real data has been processed for a full chunk interval, one
/// all-zero chunk is produced and the timer restarts. Longer gaps are not
/// backfilled: at most one silent chunk per interval window.
#[derive(Debug)]
pub struct SilenceWatchdog {
    enabled: bool,
    interval: Duration,
    last_data: Instant,
    silent_chunk: Vec<u8>,
}

impl SilenceWatchdog {
    /// `chunk_samples` is the interleaved sample count of one output chunk.
    pub fn new(enabled: bool, interval: Duration, chunk_samples: usize, now: Instant) -> Self {
        let silent_chunk = if enabled {
            vec![0u8; chunk_samples * std::mem::size_of::<f32>()]
        } else {
            Vec::new()
        };
        Self {
            enabled,
            interval,
            last_data: now,
            silent_chunk,
        }
    }

    /// Real frames were processed at `now`.
    pub fn record_data(&mut self, now: Instant) {
        self.last_data = now;
    }

    /// Check an iteration that produced no real frames.
    ///
    /// Returns the silent chunk bytes when a full interval has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<&[u8]> {
        if !self.enabled || self.silent_chunk.is_empty() {
            return None;
        }
        if now.saturating_duration_since(self.last_data) < self.interval {
            return None;
        }
        self.last_data = now;
        Some(&self.silent_chunk)
    }
}
