//! Formatting helpers for sizes, durations and progress.

use std::time::Duration;

/// Formats a byte count as a human-readable string (B, KiB, MiB, GiB).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Formats a byte count in MiB with one decimal, e.g. `11.4`.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_mib(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / 1_048_576.0)
}

/// Formats a duration as a human-readable string (e.g. "5.0s", "1m 05s", "1h 01m 05s").
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!(
            "{}h {:02}m {:02}s",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}.{:01}s", secs, d.subsec_millis() / 100)
    }
}

/// Fraction of `total` that `done` represents, clamped to `0.0..=1.0`.
///
/// An unknown or zero total reads as 0.0 until something is done.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn fraction(done: u64, total: Option<u64>) -> f64 {
    match total {
        Some(total) if total > 0 => (done as f64 / total as f64).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Formats progress as a percentage with one decimal, e.g. ` 41.7%`.
#[must_use]
pub fn format_percent(done: u64, total: Option<u64>) -> String {
    format!("{:5.1}%", fraction(done, total) * 100.0)
}
