//! Reconciliation of a subject's recording feed against the local archive.
//!
//! Every recording is turned into a [`LectureRecord`] and classified as new,
//! complete, incomplete or out of range. In-range recordings that are missing
//! or partial become [`TransferJob`]s; nothing on disk is modified apart from
//! creating the subject and lecture folders.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::archive::ArchiveLayout;
use crate::calendar::SemesterCalendar;
use crate::config::UnknownSizePolicy;
use crate::error::{Error, Result};
use crate::feed::{RemoteRecording, Subject, SubjectFeed};
use crate::format::format_mib;
use crate::fs::FileSystem;
use crate::naming::LectureNamer;
use crate::remote::RemoteSource;
use crate::selection::DateSelection;

/// Outcome of comparing one recording with the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LectureStatus {
    /// In range and not on disk.
    New,
    /// In range and on disk with at least the remote size.
    Complete {
        /// Local size in bytes.
        local: u64,
        /// Remote size, if the server reported one.
        remote: Option<u64>,
    },
    /// In range and on disk, but smaller than the remote object.
    Incomplete {
        /// Local size in bytes; the transfer resumes here.
        local: u64,
        /// Remote size in bytes.
        remote: u64,
    },
    /// In range and on disk, remote size unknown, downloading again.
    SizeUnknown {
        /// Local size in bytes.
        local: u64,
    },
    /// Outside the selected dates, not on disk.
    OutOfRange,
    /// Outside the selected dates, already on disk.
    OutOfRangeExists,
}

impl LectureStatus {
    /// Whether this status produces a transfer job.
    #[must_use]
    pub const fn needs_transfer(self) -> bool {
        matches!(
            self,
            Self::New | Self::Incomplete { .. } | Self::SizeUnknown { .. }
        )
    }

    /// Human-readable explanation shown next to the lecture name.
    #[must_use]
    pub fn reason(self) -> String {
        match self {
            Self::New => "New lecture".to_string(),
            Self::Complete { remote: Some(_), .. } => {
                "File already exists on disk (fully downloaded)".to_string()
            }
            Self::Complete { remote: None, .. } => {
                "File already exists on disk (server did not report a size)".to_string()
            }
            Self::Incomplete { local, remote } => format!(
                "Incomplete file ({}/{} MiB)",
                format_mib(local),
                format_mib(remote)
            ),
            Self::SizeUnknown { local } => format!(
                "Server did not report a size, downloading again over {} MiB",
                format_mib(local)
            ),
            Self::OutOfRange => "Outside date range".to_string(),
            Self::OutOfRangeExists => "Outside date range and file already exists".to_string(),
        }
    }
}

impl fmt::Display for LectureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason())
    }
}

/// A recording after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LectureRecord {
    /// Owning subject.
    pub subject: Subject,
    /// Teaching week of the capture date.
    pub week: u8,
    /// 1-based chronological position among the week's recordings.
    pub ordinal: u32,
    /// Capture time.
    pub captured_at: NaiveDateTime,
    /// Position in the feed, counted from the oldest recording.
    pub sequence_index: usize,
    /// Media link.
    pub access_link: String,
    /// File name without extension.
    pub file_name: String,
    /// Full destination path.
    pub file_path: PathBuf,
    /// Classification.
    pub status: LectureStatus,
}

impl LectureRecord {
    fn pending(subject: &Subject, recording: &RemoteRecording, week: u8) -> Self {
        Self {
            subject: subject.clone(),
            week,
            ordinal: 1,
            captured_at: recording.captured_at,
            sequence_index: recording.sequence_index,
            access_link: recording.access_link.clone(),
            file_name: String::new(),
            file_path: PathBuf::new(),
            status: LectureStatus::New,
        }
    }
}

/// One queued download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// The lecture to fetch.
    pub record: LectureRecord,
    /// Bytes already on disk; 0 for a full download.
    pub resume_offset: u64,
}

impl TransferJob {
    /// Display name of the lecture.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.record.file_name
    }
}

/// Result of reconciling one subject.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Downloads to queue, newest first.
    pub jobs: Vec<TransferJob>,
    /// Records that need no download.
    pub skipped: Vec<LectureRecord>,
    /// Every examined record in feed order.
    pub records: Vec<LectureRecord>,
}

/// Classifies feeds against the archive.
pub struct Reconciler<'a> {
    calendar: &'a SemesterCalendar,
    layout: &'a ArchiveLayout,
    namer: &'a dyn LectureNamer,
    unknown_size: UnknownSizePolicy,
    strict_order: bool,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler with the default policies.
    #[must_use]
    pub fn new(
        calendar: &'a SemesterCalendar,
        layout: &'a ArchiveLayout,
        namer: &'a dyn LectureNamer,
    ) -> Self {
        Self {
            calendar,
            layout,
            namer,
            unknown_size: UnknownSizePolicy::default(),
            strict_order: false,
        }
    }

    /// Sets what happens to existing files whose remote size is unknown.
    #[must_use]
    pub const fn with_unknown_size(mut self, policy: UnknownSizePolicy) -> Self {
        self.unknown_size = policy;
        self
    }

    /// Rejects feeds that are not newest-first.
    #[must_use]
    pub const fn with_strict_order(mut self, strict: bool) -> Self {
        self.strict_order = strict;
        self
    }

    /// Reconciles one subject's feed.
    ///
    /// Recordings are walked newest first. The walk stops at the first
    /// recording older than the earliest selected date.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WeekOutOfRange`] for a capture date outside the
    /// term, [`Error::FolderResolution`] if the subject has no folder, and
    /// [`Error::UnsortedFeed`] in strict mode. All of these only concern
    /// this subject.
    pub async fn reconcile<R, F>(
        &self,
        feed: &SubjectFeed,
        selection: &DateSelection,
        source: &R,
        fs: &F,
    ) -> Result<Reconciliation>
    where
        R: RemoteSource + ?Sized,
        F: FileSystem + ?Sized,
    {
        let subject = &feed.subject;
        log::info!("Now working on {}: {}", subject.code, subject.name);

        let mut records = self.collect(feed, selection)?;
        let dir = self.layout.lecture_dir(subject, fs).await?;

        let mut result = Reconciliation::default();
        for record in &mut records {
            record.file_name = self.namer.stem(subject, record.week, record.ordinal);
            record.file_path = self.layout.lecture_path(&dir, &record.file_name);

            let (status, resume_offset) = self.classify(record, selection, source, fs).await;
            record.status = status;

            match status {
                LectureStatus::New => log::info!("Will download {}", record.file_name),
                LectureStatus::Incomplete { .. } | LectureStatus::SizeUnknown { .. } => {
                    log::info!("Resuming {}: {status}", record.file_name);
                }
                _ => log::info!("Skipping {}: {status}", record.file_name),
            }

            if status.needs_transfer() {
                result.jobs.push(TransferJob {
                    record: record.clone(),
                    resume_offset,
                });
            } else {
                result.skipped.push(record.clone());
            }
        }

        if result.jobs.is_empty() {
            log::info!("No lectures to be downloaded for {}", subject.name);
        }
        result.records = records;
        Ok(result)
    }

    /// Builds week-numbered records with chronological ordinals.
    fn collect(&self, feed: &SubjectFeed, selection: &DateSelection) -> Result<Vec<LectureRecord>> {
        let earliest = selection.earliest();
        let mut records: Vec<LectureRecord> = Vec::new();
        let mut previous: Option<NaiveDateTime> = None;

        for recording in &feed.recordings {
            if self.strict_order
                && let Some(newer) = previous
                && recording.captured_at > newer
            {
                return Err(Error::UnsortedFeed {
                    code: feed.subject.code.clone(),
                    older: newer,
                    newer: recording.captured_at,
                });
            }
            previous = Some(recording.captured_at);

            let date = recording.captured_at.date();
            if date < earliest {
                log::debug!(
                    "{}: recordings from {date} on are before the selected range, stopping",
                    feed.subject.code
                );
                break;
            }

            let week = self.calendar.week_for(date)?;
            // Records seen so far are newer; each shifts one place later in its week.
            for earlier in records.iter_mut().filter(|r| r.week == week) {
                earlier.ordinal += 1;
            }
            records.push(LectureRecord::pending(&feed.subject, recording, week));
        }

        Ok(records)
    }

    async fn classify<R, F>(
        &self,
        record: &LectureRecord,
        selection: &DateSelection,
        source: &R,
        fs: &F,
    ) -> (LectureStatus, u64)
    where
        R: RemoteSource + ?Sized,
        F: FileSystem + ?Sized,
    {
        let in_range = selection.contains(record.captured_at.date());
        let local = fs.file_size(&record.file_path).await;

        let Some(local) = local else {
            return if in_range {
                (LectureStatus::New, 0)
            } else {
                (LectureStatus::OutOfRange, 0)
            };
        };
        if !in_range {
            return (LectureStatus::OutOfRangeExists, 0);
        }

        let remote = match source.content_length(&record.access_link).await {
            Ok(remote) => remote,
            Err(e) => {
                log::warn!("Could not get the size of {}: {e}", record.file_name);
                None
            }
        };

        match remote {
            Some(remote) if remote > local => (LectureStatus::Incomplete { local, remote }, local),
            Some(remote) => (
                LectureStatus::Complete {
                    local,
                    remote: Some(remote),
                },
                0,
            ),
            None => match self.unknown_size {
                UnknownSizePolicy::AssumeComplete => {
                    (LectureStatus::Complete { local, remote: None }, 0)
                }
                UnknownSizePolicy::Redownload => (LectureStatus::SizeUnknown { local }, 0),
            },
        }
    }
}
