//! Transfer statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Statistics for one finished transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStats {
    /// Bytes written by this transfer.
    pub bytes_written: u64,
    /// Size of the file on disk afterwards.
    pub final_size: u64,
    /// Offset the transfer resumed from (0 for a full download).
    pub resumed_from: u64,
    /// Time spent streaming.
    pub elapsed: Duration,
    /// Average speed in bytes per second.
    pub average_speed: u64,
    /// Highest speed observed, in bytes per second.
    pub peak_speed: u64,
}

/// Statistics for a whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Lectures transferred successfully.
    pub transferred: usize,
    /// Lectures whose transfer failed.
    pub failed: usize,
    /// Lectures that needed no transfer.
    pub skipped: usize,
    /// Lectures resumed from a partial file.
    pub resumed: usize,
    /// Bytes written across all transfers.
    pub total_bytes: u64,
    /// Wall time of the session.
    pub elapsed: Duration,
    /// Highest single-transfer speed, in bytes per second.
    pub peak_speed: u64,
}

impl SessionStats {
    /// Returns the average download speed in bytes per second.
    #[must_use]
    pub fn average_speed(&self) -> u64 {
        bytes_per_second(self.total_bytes, self.elapsed)
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn bytes_per_second(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (bytes as f64 / secs) as u64
    } else {
        0
    }
}

/// Tracks a single transfer while it streams.
#[derive(Debug)]
pub struct TransferStatsTracker {
    start_time: Instant,
    resumed_from: u64,
    written: AtomicU64,
    peak_speed: AtomicU64,
}

impl TransferStatsTracker {
    /// Starts tracking a transfer that resumes at `resumed_from`.
    #[must_use]
    pub fn new(resumed_from: u64) -> Self {
        Self {
            start_time: Instant::now(),
            resumed_from,
            written: AtomicU64::new(0),
            peak_speed: AtomicU64::new(0),
        }
    }

    /// Records written bytes and returns the current speed (bytes/sec).
    pub fn record_bytes(&self, bytes: u64) -> u64 {
        let written = self.written.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let speed = bytes_per_second(written, self.start_time.elapsed());
        self.peak_speed.fetch_max(speed, Ordering::Relaxed);
        speed
    }

    /// Bytes written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Elapsed time since the transfer started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Final statistics for a transfer that left `final_size` bytes on disk.
    #[must_use]
    pub fn finish(&self, final_size: u64) -> TransferStats {
        let elapsed = self.elapsed();
        let bytes_written = self.written();
        TransferStats {
            bytes_written,
            final_size,
            resumed_from: self.resumed_from,
            elapsed,
            average_speed: bytes_per_second(bytes_written, elapsed),
            peak_speed: self.peak_speed.load(Ordering::Relaxed),
        }
    }
}

/// Accumulates [`SessionStats`] while the queue drains.
#[derive(Debug)]
pub struct SessionStatsBuilder {
    stats: SessionStats,
    start_time: Instant,
}

impl Default for SessionStatsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStatsBuilder {
    /// Starts the session clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stats: SessionStats::default(),
            start_time: Instant::now(),
        }
    }

    /// Records a finished transfer.
    pub fn add_transfer(&mut self, transfer: &TransferStats) {
        self.stats.transferred += 1;
        self.stats.total_bytes += transfer.bytes_written;
        if transfer.resumed_from > 0 {
            self.stats.resumed += 1;
        }
        self.stats.peak_speed = self.stats.peak_speed.max(transfer.peak_speed);
    }

    /// Records a failed transfer.
    pub const fn add_failure(&mut self) {
        self.stats.failed += 1;
    }

    /// Adds lectures that were skipped during reconciliation.
    pub const fn add_skipped(&mut self, count: usize) {
        self.stats.skipped += count;
    }

    /// Builds the final session statistics.
    #[must_use]
    pub fn build(self) -> SessionStats {
        SessionStats {
            elapsed: self.start_time.elapsed(),
            ..self.stats
        }
    }
}
