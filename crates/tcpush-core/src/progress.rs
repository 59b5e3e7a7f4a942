//! Progress tracking for a single transfer
//!
//! One tracker per session, owned by the thread running the data loop.
//! Milestones are logged at debug level so long transfers show signs of life
//! without logging every chunk.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::types::{human_rate, ByteCount};

/// Bytes between two progress log lines (16 MB)
pub const PROGRESS_LOG_INTERVAL: u64 = 16 * 1024 * 1024;

/// Point-in-time view of a transfer
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Total bytes expected, when known (the sender knows, the receiver doesn't)
    pub total_bytes: Option<u64>,
    pub bytes_done: ByteCount,
    pub chunks_done: u64,
    /// Average speed since the tracker started (bytes/sec)
    pub speed_bps: f64,
    /// Estimated time remaining (seconds)
    pub eta_secs: Option<f64>,
}

impl TransferProgress {
    /// Completion percentage, if the total is known
    pub fn percent(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.bytes_done.get() as f64 / total as f64) * 100.0
            }
        })
    }
}

/// Tracks progress during a transfer
#[derive(Debug)]
pub struct TransferProgressTracker {
    label: &'static str,
    total_bytes: Option<u64>,
    bytes_done: ByteCount,
    chunks_done: u64,
    next_log_at: u64,
    start_time: Instant,
}

impl TransferProgressTracker {
    pub fn new(label: &'static str, total_bytes: Option<u64>) -> Self {
        Self {
            label,
            total_bytes,
            bytes_done: ByteCount::ZERO,
            chunks_done: 0,
            next_log_at: PROGRESS_LOG_INTERVAL,
            start_time: Instant::now(),
        }
    }

    /// Record one chunk of `bytes` moved
    pub fn record_chunk(&mut self, bytes: u64) {
        self.bytes_done += bytes;
        self.chunks_done += 1;

        if self.bytes_done.get() >= self.next_log_at {
            self.next_log_at = self.bytes_done.get() + PROGRESS_LOG_INTERVAL;
            let progress = self.progress();
            match progress.percent() {
                Some(pct) => debug!(
                    "{}: {} bytes ({:.1}%), {}",
                    self.label,
                    progress.bytes_done,
                    pct,
                    human_rate(progress.bytes_done, self.elapsed())
                ),
                None => debug!(
                    "{}: {} bytes, {}",
                    self.label,
                    progress.bytes_done,
                    human_rate(progress.bytes_done, self.elapsed())
                ),
            }
        }
    }

    pub fn bytes_done(&self) -> ByteCount {
        self.bytes_done
    }

    pub fn chunks_done(&self) -> u64 {
        self.chunks_done
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get current progress snapshot
    pub fn progress(&self) -> TransferProgress {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let speed_bps = if elapsed > 0.0 {
            self.bytes_done.get() as f64 / elapsed
        } else {
            0.0
        };

        let eta_secs = match self.total_bytes {
            Some(total) if speed_bps > 0.0 => {
                Some(total.saturating_sub(self.bytes_done.get()) as f64 / speed_bps)
            }
            _ => None,
        };

        TransferProgress {
            total_bytes: self.total_bytes,
            bytes_done: self.bytes_done,
            chunks_done: self.chunks_done,
            speed_bps,
            eta_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracker() {
        let mut tracker = TransferProgressTracker::new("send", Some(10_000));

        tracker.record_chunk(2500);
        tracker.record_chunk(2500);

        let progress = tracker.progress();
        assert_eq!(progress.bytes_done, ByteCount(5000));
        assert_eq!(progress.chunks_done, 2);
        assert!((progress.percent().unwrap() - 50.0).abs() < 0.1);
    }

    #[test]
    fn test_unknown_total_has_no_percent() {
        let mut tracker = TransferProgressTracker::new("receive", None);
        tracker.record_chunk(PROGRESS_LOG_INTERVAL + 1);

        let progress = tracker.progress();
        assert!(progress.percent().is_none());
        assert!(progress.eta_secs.is_none());
        assert_eq!(tracker.chunks_done(), 1);
    }

    #[test]
    fn test_empty_total_is_complete() {
        let tracker = TransferProgressTracker::new("send", Some(0));
        assert_eq!(tracker.progress().percent(), Some(100.0));
    }
}
