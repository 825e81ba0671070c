//! Full and resumed byte-range transfers with progress reporting.

use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::format::format_mib;
use crate::fs::{FileSystem, TokioFileSystem};
use crate::reconcile::TransferJob;
use crate::remote::RemoteSource;
use crate::stats::{TransferStats, TransferStatsTracker};

/// Default maximum bytes per disk write.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Trait for receiving transfer progress updates.
///
/// All methods have default no-op implementations.
pub trait TransferProgress: Send + Sync {
    /// Called once the destination is open. `total` is the expected final
    /// size, if known.
    fn on_start(&self, _label: &str, _offset: u64, _total: Option<u64>) {}

    /// Called after every write with the bytes now on disk.
    fn on_progress(&self, _bytes_transferred: u64, _bytes_total: Option<u64>, _label: &str) {}

    /// Called when a transfer completes successfully.
    fn on_complete(&self, _label: &str, _stats: &TransferStats) {}

    /// Called when a transfer fails.
    fn on_error(&self, _label: &str, _error: &str) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl TransferProgress for NoProgress {}

/// A finished transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Display name of the lecture.
    pub label: String,
    /// Destination file.
    pub path: PathBuf,
    /// Byte counts and speeds.
    pub stats: TransferStats,
    /// The server ignored the range request and the file was rewritten from the start.
    pub restarted: bool,
}

/// Streams remote recordings to disk.
pub struct TransferEngine<R: RemoteSource + ?Sized, F: FileSystem + ?Sized = TokioFileSystem> {
    source: Arc<R>,
    fs: Arc<F>,
    chunk_size: usize,
}

impl<R: RemoteSource + ?Sized, F: FileSystem + ?Sized> TransferEngine<R, F> {
    /// Creates an engine writing at most [`DEFAULT_CHUNK_SIZE`] bytes at a time.
    #[must_use]
    pub const fn new(source: Arc<R>, fs: Arc<F>) -> Self {
        Self {
            source,
            fs,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets the maximum bytes per write. Zero is treated as one.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Transfers one job.
    ///
    /// A job with a resume offset appends to the existing file after
    /// requesting `Range: bytes=<offset>-`. If the server answers with the
    /// whole object instead, the file is truncated and written from byte 0.
    /// Completeness is not re-checked beyond the declared length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transfer`] carrying the lecture name. Whatever was
    /// written stays on disk so a later run can resume it.
    pub async fn transfer(
        &self,
        job: &TransferJob,
        progress: &dyn TransferProgress,
    ) -> Result<TransferOutcome> {
        let label = job.label();
        match self.stream(job, progress).await {
            Ok(outcome) => {
                log::info!(
                    "Finished {label} ({} MiB)",
                    format_mib(outcome.stats.final_size)
                );
                progress.on_complete(label, &outcome.stats);
                Ok(outcome)
            }
            Err(e) => {
                let e = match e {
                    Error::Transfer { label: ref failed, .. } if failed == label => e,
                    other => Error::Transfer {
                        label: label.to_string(),
                        reason: other.full_message(),
                    },
                };
                log::error!("{e}");
                progress.on_error(label, &e.to_string());
                Err(e)
            }
        }
    }

    async fn stream(
        &self,
        job: &TransferJob,
        progress: &dyn TransferProgress,
    ) -> Result<TransferOutcome> {
        let label = job.label();
        let path = &job.record.file_path;
        let mut offset = job.resume_offset;

        let body = self.source.open(&job.record.access_link, offset).await?;
        let restarted = offset > 0 && !body.range_honoured;
        if restarted {
            log::warn!("Server ignored the range request for {label}, downloading from the start");
            offset = 0;
        }
        let total = body.content_length.map(|len| len + offset);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs.create_dir_all(parent).await?;
        }
        let mut file = self.fs.open_for_write(path, offset > 0).await?;

        if offset == 0 {
            log::info!("Downloading {label} to {}", path.display());
        } else {
            log::info!(
                "Resuming partial download of {label} ({}/{} MiB)",
                format_mib(offset),
                total.map_or_else(|| "?".to_string(), format_mib)
            );
        }
        progress.on_start(label, offset, total);

        let tracker = TransferStatsTracker::new(offset);
        let mut done = offset;
        let mut chunks = body.chunks;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            for piece in chunk.chunks(self.chunk_size) {
                file.write_all(piece).await?;
                let len = piece.len() as u64;
                done += len;
                tracker.record_bytes(len);
                progress.on_progress(done, total, label);
            }
        }
        file.flush().await?;

        if let Some(total) = total
            && done < total
        {
            return Err(Error::Transfer {
                label: label.to_string(),
                reason: format!("connection closed after {done} of {total} bytes"),
            });
        }

        Ok(TransferOutcome {
            label: label.to_string(),
            path: path.clone(),
            stats: tracker.finish(done),
            restarted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Subject;
    use crate::format::fraction;
    use crate::reconcile::{LectureRecord, LectureStatus};
    use crate::remote::RemoteBody;
    use crate::testing::{MemoryObject, MemorySource, ProgressEvent, RecordingProgress};
    use bytes::Bytes;
    use chrono::NaiveDate;
    use std::path::Path;
    use tempfile::TempDir;

    const LINK: &str = "https://echo.example/lecture.m4v";

    fn job(path: &Path, resume_offset: u64) -> TransferJob {
        TransferJob {
            record: LectureRecord {
                subject: Subject::new("COMP10001", "Foundations of Computing"),
                week: 3,
                ordinal: 1,
                captured_at: NaiveDate::from_ymd_opt(2017, 8, 10)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap(),
                sequence_index: 1,
                access_link: LINK.to_string(),
                file_name: "COMP10001 Week 03 Lecture 1".to_string(),
                file_path: path.to_path_buf(),
                status: LectureStatus::New,
            },
            resume_offset,
        }
    }

    fn engine(source: MemorySource) -> TransferEngine<MemorySource> {
        TransferEngine::new(Arc::new(source), Arc::new(TokioFileSystem))
    }

    fn assert_monotonic(progress: &[(u64, Option<u64>)]) {
        assert!(progress.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[tokio::test]
    async fn full_transfer_matches_declared_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Lectures").join("lecture.m4v");
        let object = MemoryObject::filled(25_000);
        let data = object.data.clone();
        let source = MemorySource::new();
        source.insert(LINK, object);
        let progress = RecordingProgress::default();

        let outcome = engine(source)
            .with_chunk_size(4096)
            .transfer(&job(&path, 0), &progress)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), data.to_vec());
        assert_eq!(outcome.stats.final_size, 25_000);
        assert_eq!(outcome.stats.bytes_written, 25_000);
        assert!(!outcome.restarted);

        let updates = progress.progress();
        assert_monotonic(&updates);
        assert_eq!(updates.last(), Some(&(25_000, Some(25_000))));
        assert!(matches!(progress.events().last(), Some(ProgressEvent::Complete { .. })));
    }

    #[tokio::test]
    async fn resume_appends_remaining_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lecture.m4v");
        let mut object = MemoryObject::filled(12_000_000);
        object.chunk = 256 * 1024;
        let data = object.data.clone();
        std::fs::write(&path, &data[..5_000_000]).unwrap();

        let source = MemorySource::new();
        source.insert(LINK, object);
        let progress = RecordingProgress::default();
        let engine = engine(source);

        let outcome = engine
            .transfer(&job(&path, 5_000_000), &progress)
            .await
            .unwrap();

        assert_eq!(engine.source.requests(), vec![(LINK.to_string(), 5_000_000)]);
        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk.len(), 12_000_000);
        assert!(on_disk == data.to_vec());
        assert_eq!(outcome.stats.bytes_written, 7_000_000);
        assert_eq!(outcome.stats.resumed_from, 5_000_000);

        assert_eq!(
            progress.events().first(),
            Some(&ProgressEvent::Start {
                label: "COMP10001 Week 03 Lecture 1".to_string(),
                offset: 5_000_000,
                total: Some(12_000_000),
            })
        );
        let updates = progress.progress();
        assert_monotonic(&updates);
        assert!(updates.iter().all(|(done, _)| *done > 5_000_000));
        let (done, total) = *updates.last().unwrap();
        assert!((fraction(done, total) - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn ignored_range_rewrites_from_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lecture.m4v");
        std::fs::write(&path, b"stale partial data").unwrap();

        let mut object = MemoryObject::filled(3_000);
        object.honour_range = false;
        let data = object.data.clone();
        let source = MemorySource::new();
        source.insert(LINK, object);

        let outcome = engine(source)
            .transfer(&job(&path, 18), &NoProgress)
            .await
            .unwrap();

        assert!(outcome.restarted);
        assert_eq!(std::fs::read(&path).unwrap(), data.to_vec());
        assert_eq!(outcome.stats.final_size, 3_000);
    }

    #[tokio::test]
    async fn short_body_fails_and_keeps_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lecture.m4v");
        let mut object = MemoryObject::filled(1_000);
        object.truncate_at = Some(600);
        let source = MemorySource::new();
        source.insert(LINK, object);
        let progress = RecordingProgress::default();

        let err = engine(source)
            .transfer(&job(&path, 0), &progress)
            .await
            .unwrap_err();

        match err {
            Error::Transfer { label, reason } => {
                assert_eq!(label, "COMP10001 Week 03 Lecture 1");
                assert!(reason.contains("600 of 1000"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 600);
        assert!(matches!(progress.events().last(), Some(ProgressEvent::Error { .. })));
    }

    #[tokio::test]
    async fn writes_are_bounded_by_chunk_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lecture.m4v");
        let mut object = MemoryObject::filled(10_000);
        object.chunk = 10_000;
        let source = MemorySource::new();
        source.insert(LINK, object);
        let progress = RecordingProgress::default();

        engine(source)
            .with_chunk_size(1024)
            .transfer(&job(&path, 0), &progress)
            .await
            .unwrap();

        let done: Vec<u64> = progress.progress().iter().map(|(d, _)| *d).collect();
        assert_eq!(done.len(), 10);
        let mut previous = 0;
        for d in done {
            assert!(d - previous <= 1024);
            previous = d;
        }
        assert_eq!(previous, 10_000);
    }

    #[tokio::test]
    async fn unknown_source_is_a_transfer_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lecture.m4v");
        let err = engine(MemorySource::new())
            .transfer(&job(&path, 0), &NoProgress)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Transfer { ref label, .. } if label == "COMP10001 Week 03 Lecture 1")
        );
        assert!(!path.exists());
    }

    #[derive(Debug, thiserror::Error)]
    #[error("operation timed out")]
    struct TimedOut;

    #[derive(Debug, thiserror::Error)]
    #[error("error decoding response body")]
    struct Decode(#[source] TimedOut);

    /// Sends four bytes of a ten byte body, then fails.
    struct StallingSource;

    #[async_trait::async_trait]
    impl RemoteSource for StallingSource {
        async fn content_length(&self, _link: &str) -> Result<Option<u64>> {
            Ok(Some(10))
        }

        async fn open(&self, _link: &str, _offset: u64) -> Result<RemoteBody> {
            let chunks: Vec<Result<Bytes>> = vec![
                Ok(Bytes::from_static(b"abcd")),
                Err(Error::Io(std::io::Error::other(Decode(TimedOut)))),
            ];
            Ok(RemoteBody {
                content_length: Some(10),
                range_honoured: true,
                chunks: futures::stream::iter(chunks).boxed(),
            })
        }
    }

    #[tokio::test]
    async fn failure_reason_keeps_the_underlying_cause() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lecture.m4v");
        let engine = TransferEngine::new(Arc::new(StallingSource), Arc::new(TokioFileSystem));

        let err = engine
            .transfer(&job(&path, 0), &NoProgress)
            .await
            .unwrap_err();

        match err {
            Error::Transfer { reason, .. } => assert_eq!(
                reason,
                "I/O error: error decoding response body: operation timed out"
            ),
            other => panic!("unexpected error: {other}"),
        }
    }
}
