//! Producer/consumer queue between reconciliation and the transfer engine.
//!
//! Reconciliation pushes [`TransferJob`]s while it moves on to the next
//! subject; a single worker task runs them one at a time, in the order they
//! were pushed. [`TransferQueue::close`] enqueues the shutdown sentinel: the
//! worker finishes everything queued before it and then exits.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::reconcile::TransferJob;
use crate::remote::RemoteSource;
use crate::stats::{SessionStats, SessionStatsBuilder};
use crate::transfer::{TransferEngine, TransferOutcome, TransferProgress};

/// A message on the transfer queue.
#[derive(Debug)]
pub enum QueueMessage {
    /// Download this lecture.
    Job(Box<TransferJob>),
    /// No more jobs follow.
    Shutdown,
}

/// A job whose transfer failed.
#[derive(Debug, Clone)]
pub struct FailedTransfer {
    /// The job as it was queued.
    pub job: TransferJob,
    /// Why it failed.
    pub error: String,
}

/// What the worker did before it exited.
#[derive(Debug, Clone, Default)]
pub struct TransferReport {
    /// Successful transfers, in queue order.
    pub completed: Vec<TransferOutcome>,
    /// Failed transfers, in queue order.
    pub failed: Vec<FailedTransfer>,
    /// Byte counts and speeds.
    pub stats: SessionStats,
}

/// Producer handle. Cloning gives another producer on the same queue.
#[derive(Debug, Clone)]
pub struct TransferQueue {
    tx: mpsc::UnboundedSender<QueueMessage>,
}

/// Handle to the running worker task.
#[derive(Debug)]
pub struct TransferWorker {
    handle: JoinHandle<TransferReport>,
}

impl TransferQueue {
    /// Spawns the worker and returns the producer handle alongside it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<R, F>(
        engine: TransferEngine<R, F>,
        progress: Arc<dyn TransferProgress>,
    ) -> (Self, TransferWorker)
    where
        R: RemoteSource + ?Sized + 'static,
        F: FileSystem + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(consume(rx, engine, progress));
        (Self { tx }, TransferWorker { handle })
    }

    /// Appends a job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] once the worker has exited.
    pub fn push(&self, job: TransferJob) -> Result<()> {
        log::debug!("Queued {}", job.label());
        self.tx
            .send(QueueMessage::Job(Box::new(job)))
            .map_err(|_| Error::QueueClosed)
    }

    /// Appends the shutdown sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] once the worker has exited.
    pub fn close(&self) -> Result<()> {
        self.tx
            .send(QueueMessage::Shutdown)
            .map_err(|_| Error::QueueClosed)
    }
}

impl TransferWorker {
    /// Waits for the worker to drain the queue and exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transfer`] if the worker task panicked.
    pub async fn join(self) -> Result<TransferReport> {
        self.handle.await.map_err(|e| Error::Transfer {
            label: "transfer worker".to_string(),
            reason: e.to_string(),
        })
    }
}

async fn consume<R, F>(
    mut rx: mpsc::UnboundedReceiver<QueueMessage>,
    engine: TransferEngine<R, F>,
    progress: Arc<dyn TransferProgress>,
) -> TransferReport
where
    R: RemoteSource + ?Sized,
    F: FileSystem + ?Sized,
{
    let mut stats = SessionStatsBuilder::new();
    let mut completed = Vec::new();
    let mut failed = Vec::new();

    while let Some(message) = rx.recv().await {
        let job = match message {
            QueueMessage::Job(job) => *job,
            QueueMessage::Shutdown => {
                log::debug!("Transfer queue drained, worker exiting");
                break;
            }
        };

        match engine.transfer(&job, progress.as_ref()).await {
            Ok(outcome) => {
                stats.add_transfer(&outcome.stats);
                completed.push(outcome);
            }
            Err(e) => {
                stats.add_failure();
                failed.push(FailedTransfer {
                    job,
                    error: e.to_string(),
                });
            }
        }
    }

    TransferReport {
        completed,
        failed,
        stats: stats.build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Subject;
    use crate::fs::TokioFileSystem;
    use crate::reconcile::{LectureRecord, LectureStatus};
    use crate::testing::{MemoryObject, MemorySource, ProgressEvent, RecordingProgress};
    use crate::transfer::NoProgress;
    use chrono::NaiveDate;
    use std::path::Path;
    use tempfile::TempDir;

    fn job(dir: &Path, n: u32) -> TransferJob {
        let name = format!("COMP10001 Week 03 Lecture {n}");
        TransferJob {
            record: LectureRecord {
                subject: Subject::new("COMP10001", "Foundations of Computing"),
                week: 3,
                ordinal: n,
                captured_at: NaiveDate::from_ymd_opt(2017, 8, 7)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap(),
                sequence_index: n as usize,
                access_link: format!("https://echo.example/{n}.m4v"),
                file_path: dir.join(format!("{name}.m4v")),
                file_name: name,
                status: LectureStatus::New,
            },
            resume_offset: 0,
        }
    }

    fn source(links: &[u32]) -> Arc<MemorySource> {
        let source = MemorySource::new();
        for n in links {
            source.insert(
                &format!("https://echo.example/{n}.m4v"),
                MemoryObject::filled(2_000),
            );
        }
        Arc::new(source)
    }

    fn start(
        source: Arc<MemorySource>,
        progress: Arc<dyn TransferProgress>,
    ) -> (TransferQueue, TransferWorker) {
        TransferQueue::start(TransferEngine::new(source, Arc::new(TokioFileSystem)), progress)
    }

    #[tokio::test]
    async fn runs_jobs_in_fifo_order() {
        let dir = TempDir::new().unwrap();
        let progress = Arc::new(RecordingProgress::default());
        let (queue, worker) = start(source(&[1, 2, 3]), progress.clone());

        for n in [3, 1, 2] {
            queue.push(job(dir.path(), n)).unwrap();
        }
        queue.close().unwrap();
        let report = worker.join().await.unwrap();

        let labels: Vec<_> = report.completed.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "COMP10001 Week 03 Lecture 3",
                "COMP10001 Week 03 Lecture 1",
                "COMP10001 Week 03 Lecture 2"
            ]
        );
        assert_eq!(report.stats.transferred, 3);
        assert_eq!(report.stats.total_bytes, 6_000);

        // Serial: each transfer completes before the next one starts.
        let sequence: Vec<_> = progress
            .events()
            .into_iter()
            .filter(|e| !matches!(e, ProgressEvent::Progress { .. }))
            .map(|e| match e {
                ProgressEvent::Start { .. } => 'S',
                ProgressEvent::Complete { .. } => 'C',
                _ => '?',
            })
            .collect();
        assert_eq!(sequence, vec!['S', 'C', 'S', 'C', 'S', 'C']);
    }

    #[tokio::test]
    async fn failures_are_reported_not_dropped() {
        let dir = TempDir::new().unwrap();
        let (queue, worker) = start(source(&[1, 3]), Arc::new(NoProgress));

        for n in 1..=3 {
            queue.push(job(dir.path(), n)).unwrap();
        }
        queue.close().unwrap();
        let report = worker.join().await.unwrap();

        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].job.label(), "COMP10001 Week 03 Lecture 2");
        assert_eq!(report.stats.failed, 1);
    }

    #[tokio::test]
    async fn queue_rejects_jobs_after_shutdown() {
        let dir = TempDir::new().unwrap();
        let (queue, worker) = start(source(&[1]), Arc::new(NoProgress));

        queue.close().unwrap();
        let report = worker.join().await.unwrap();
        assert!(report.completed.is_empty());

        assert!(matches!(queue.push(job(dir.path(), 1)), Err(Error::QueueClosed)));
        assert!(matches!(queue.close(), Err(Error::QueueClosed)));
    }

    #[tokio::test]
    async fn dropping_producers_stops_worker() {
        let dir = TempDir::new().unwrap();
        let (queue, worker) = start(source(&[1]), Arc::new(NoProgress));

        let producer = queue.clone();
        producer.push(job(dir.path(), 1)).unwrap();
        drop(producer);
        drop(queue);

        let report = worker.join().await.unwrap();
        assert_eq!(report.completed.len(), 1);
    }
}
