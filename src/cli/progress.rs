//! Progress bar and summary reporting for CLI downloads.

use std::sync::Mutex;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    SessionReport, SubjectFeed, TransferProgress, TransferStats, format_bytes, format_duration,
    format_percent,
};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates a progress bar for a lecture of known size.
fn make_progress_bar(size: u64, name: &str) -> ProgressBar {
    let bar = ProgressBar::new(size);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} - {msg}",
        )
        .expect("progress template is valid")
        .progress_chars("━━╌"),
    );
    bar.set_message(name.to_string());
    bar
}

/// Creates a spinner for a lecture whose size the server did not report.
fn make_spinner(name: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {bytes} @ {bytes_per_sec} - {msg}")
            .expect("spinner template is valid"),
    );
    bar.set_message(name.to_string());
    bar
}

/// Drives one progress bar per transfer. The queue is serial, so at most
/// one bar is live at a time.
#[derive(Default)]
pub struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    pub const fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn take(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|mut bar| bar.take())
    }
}

impl TransferProgress for CliProgress {
    fn on_start(&self, label: &str, offset: u64, total: Option<u64>) {
        let bar = total.map_or_else(|| make_spinner(label), |size| make_progress_bar(size, label));
        bar.set_position(offset);
        bar.enable_steady_tick(std::time::Duration::from_millis(250));
        if offset > 0 {
            bar.println(format!(
                "  {label}: resuming at {}",
                format_percent(offset, total)
            ));
        }
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn on_progress(&self, bytes_transferred: u64, _bytes_total: Option<u64>, _label: &str) {
        if let Ok(slot) = self.bar.lock()
            && let Some(bar) = slot.as_ref()
        {
            bar.set_position(bytes_transferred);
        }
    }

    fn on_complete(&self, label: &str, stats: &TransferStats) {
        if let Some(bar) = self.take() {
            bar.finish_and_clear();
        }
        println!(
            "  {} {label} - {} in {} ({}/s avg, {}/s peak)",
            style("✓").green(),
            format_bytes(stats.bytes_written),
            format_duration(stats.elapsed),
            format_bytes(stats.average_speed),
            format_bytes(stats.peak_speed),
        );
    }

    fn on_error(&self, label: &str, error: &str) {
        if let Some(bar) = self.take() {
            bar.abandon();
        }
        eprintln!("  {} {label}: {error}", style("✗").red());
    }
}

/// Prints the numbered subject list that `--subjects` refers to.
pub fn print_subjects(feeds: &[SubjectFeed]) {
    if feeds.is_empty() {
        println!("No subjects found.");
        return;
    }

    println!("\n{SEPARATOR}");
    println!("Subjects:");
    println!("{SEPARATOR}");
    for (i, feed) in feeds.iter().enumerate() {
        println!(
            "  {:>2}. {} {} ({} recordings)",
            i + 1,
            style(&feed.subject.code).cyan(),
            feed.subject.name,
            feed.recordings.len()
        );
    }
    println!("{SEPARATOR}\n");
}

/// Prints what the session downloaded, skipped and failed.
pub fn print_summary(report: &SessionReport) {
    let stats = &report.stats;

    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");

    if report.completed.is_empty() {
        println!("  No lectures downloaded.");
    } else {
        println!("  {}", style("Downloaded:").green().bold());
        for outcome in &report.completed {
            let note = if outcome.restarted {
                " (server ignored resume, downloaded in full)"
            } else if outcome.stats.resumed_from > 0 {
                " (resumed)"
            } else {
                ""
            };
            println!(
                "    {} ({}){note}",
                outcome.label,
                format_bytes(outcome.stats.final_size)
            );
        }
    }

    if !report.skipped.is_empty() {
        println!("  {}", style("Skipped:").dim());
        for record in &report.skipped {
            println!("    {}: {}", record.file_name, style(record.status).dim());
        }
    }

    if !report.failed.is_empty() {
        println!("  {}", style("Failed:").red().bold());
        for failure in &report.failed {
            println!("    {}: {}", failure.job.label(), failure.error);
        }
    }

    if !report.subject_errors.is_empty() {
        println!("  {}", style("Subjects skipped:").yellow().bold());
        for subject in &report.subject_errors {
            println!("    {}: {}", subject.code, subject.error);
        }
    }

    println!("{SEPARATOR}");
    if stats.transferred > 0 {
        println!("  Lectures downloaded: {}", stats.transferred);
        if stats.resumed > 0 {
            println!("  Resumed:             {}", stats.resumed);
        }
        println!("  Total size:          {}", format_bytes(stats.total_bytes));
        println!("  Total time:          {}", format_duration(stats.elapsed));
        println!(
            "  Average speed:       {}/s",
            format_bytes(stats.average_speed())
        );
        println!("  Peak speed:          {}/s", format_bytes(stats.peak_speed));
    }
    if stats.skipped > 0 {
        println!("  Lectures skipped:    {}", stats.skipped);
    }
    if stats.failed > 0 {
        println!("  Lectures failed:     {}", stats.failed);
    }
    println!("{SEPARATOR}");
}
