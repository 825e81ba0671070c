//! One complete run: reconcile every selected subject and drain the queue.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::archive::{self, ArchiveLayout};
use crate::calendar::SemesterCalendar;
use crate::config::Config;
use crate::error::Result;
use crate::feed::{SubjectFeed, select_subjects};
use crate::fs::FileSystem;
use crate::naming::NameTemplate;
use crate::queue::{FailedTransfer, TransferQueue};
use crate::reconcile::{LectureRecord, Reconciler, TransferJob};
use crate::remote::RemoteSource;
use crate::selection::RangeSpec;
use crate::stats::SessionStats;
use crate::transfer::{TransferEngine, TransferOutcome, TransferProgress};

/// A subject that could not be reconciled.
#[derive(Debug, Clone)]
pub struct SubjectError {
    /// Subject code.
    pub code: String,
    /// What went wrong.
    pub error: String,
}

/// Everything a run did.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    /// Jobs handed to the queue, in queue order.
    pub queued: Vec<TransferJob>,
    /// Lectures that needed no transfer, with their status.
    pub skipped: Vec<LectureRecord>,
    /// Successful transfers.
    pub completed: Vec<TransferOutcome>,
    /// Failed transfers.
    pub failed: Vec<FailedTransfer>,
    /// Subjects skipped because of an error.
    pub subject_errors: Vec<SubjectError>,
    /// Totals.
    pub stats: SessionStats,
}

impl SessionReport {
    /// True when every subject was reconciled and every transfer succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.subject_errors.is_empty()
    }
}

/// Runs one session.
///
/// The date selection is resolved once. Each subject is reconciled in turn
/// and its jobs are queued while the worker is already downloading. A
/// subject that fails is logged and skipped. Once every subject has been
/// seen the queue is closed and the worker drained.
///
/// # Errors
///
/// Returns an error for problems that affect the whole run: invalid
/// configuration, an invalid date range or subject choice, a missing archive
/// root, or a worker that died.
pub async fn run_session<R, F>(
    config: &Config,
    feeds: Vec<SubjectFeed>,
    source: Arc<R>,
    fs: Arc<F>,
    progress: Arc<dyn TransferProgress>,
    today: NaiveDate,
) -> Result<SessionReport>
where
    R: RemoteSource + ?Sized + 'static,
    F: FileSystem + ?Sized + 'static,
{
    config.validate()?;
    let calendar = SemesterCalendar::new(&config.calendar)?;
    let range = RangeSpec::from_config(&config.selection, &calendar, today)?;
    let selection = range.resolve(&calendar, today)?;
    log::info!(
        "Lectures will be downloaded for the dates between {} and {}, inclusive",
        selection.earliest().format("%d %B"),
        selection.latest().format("%d %B")
    );

    let feeds = select_subjects(feeds, &config.selection.subjects)?;
    let root = archive::check_root(&config.archive, fs.as_ref()).await?;
    let layout = ArchiveLayout::new(config)?.with_root(root);
    let namer = NameTemplate::parse(&config.naming.lecture_format)?;
    let reconciler = Reconciler::new(&calendar, &layout, &namer)
        .with_unknown_size(config.transfer.unknown_size)
        .with_strict_order(config.transfer.strict_feed_order);

    let engine = TransferEngine::new(Arc::clone(&source), Arc::clone(&fs))
        .with_chunk_size(config.transfer.chunk_size);
    let (queue, worker) = TransferQueue::start(engine, progress);

    let mut report = SessionReport::default();
    for feed in &feeds {
        let code = &feed.subject.code;
        match reconciler
            .reconcile(feed, &selection, source.as_ref(), fs.as_ref())
            .await
        {
            Ok(result) => {
                for job in result.jobs {
                    report.queued.push(job.clone());
                    queue.push(job)?;
                }
                report.skipped.extend(result.skipped);
                log::info!("Queued downloads for {code}");
            }
            Err(e) => {
                if e.is_subject_fatal() {
                    log::error!("Skipping {code}: {e}");
                } else {
                    log::error!("Skipping {code} after unexpected error: {e}");
                }
                report.subject_errors.push(SubjectError {
                    code: code.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    queue.close()?;
    let transfers = worker.join().await?;
    report.completed = transfers.completed;
    report.failed = transfers.failed;
    report.stats = SessionStats {
        skipped: report.skipped.len(),
        ..transfers.stats
    };
    Ok(report)
}
