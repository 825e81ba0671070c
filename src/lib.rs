//! lecture-dl - keeps a local archive of recorded lectures up to date.
//!
//! The library reconciles each subject's remote recording feed against the
//! files already on disk, then downloads what is new or incomplete through a
//! serial transfer queue, resuming partial files where the server allows it.
//! It knows nothing about terminals; the `cli` feature adds progress bars and
//! the `lecture-dl` binary.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use lecture_dl::{Config, HttpSource, NoProgress, TokioFileSystem, load_feed, run_session};
//!
//! # async fn example() -> lecture_dl::Result<()> {
//! let config = Config::load_or_default(&Config::default_path())?.with_date_range("1-4");
//! let feeds = load_feed(Path::new("subjects.json"), config.calendar.year)?;
//!
//! let report = run_session(
//!     &config,
//!     feeds,
//!     Arc::new(HttpSource::new(&config.transfer)?),
//!     Arc::new(TokioFileSystem),
//!     Arc::new(NoProgress),
//!     chrono::Local::now().date_naive(),
//! )
//! .await?;
//! println!("Downloaded {} lectures", report.stats.transferred);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod archive;
pub mod calendar;
pub mod config;
pub mod error;
pub mod feed;
pub mod format;
pub mod fs;
pub mod naming;
pub mod queue;
pub mod reconcile;
pub mod remote;
pub mod retry;
pub mod selection;
pub mod session;
pub mod stats;
pub mod transfer;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use archive::{ArchiveLayout, check_root};
pub use calendar::SemesterCalendar;
pub use config::{
    ArchiveConfig, CalendarConfig, Config, MediaKind, NamingConfig, SelectionConfig,
    TransferConfig, UnknownSizePolicy, downloads_dir,
};
pub use error::{Error, Result};
pub use feed::{RemoteRecording, Subject, SubjectFeed, load_feed, parse_feed, select_subjects};
pub use format::{format_bytes, format_duration, format_mib, format_percent, fraction};
pub use fs::{FileSystem, TokioFileSystem};
pub use naming::{LectureNamer, NameTemplate};
pub use queue::{FailedTransfer, TransferQueue, TransferReport, TransferWorker};
pub use reconcile::{LectureRecord, LectureStatus, Reconciler, Reconciliation, TransferJob};
pub use remote::{HttpSource, RemoteBody, RemoteSource};
pub use retry::RetryPolicy;
pub use selection::{DateSelection, RangeSpec};
pub use session::{SessionReport, SubjectError, run_session};
pub use stats::{SessionStats, SessionStatsBuilder, TransferStats, TransferStatsTracker};
pub use transfer::{NoProgress, TransferEngine, TransferOutcome, TransferProgress};
