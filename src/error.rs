//! Error types for the lecture-dl library.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Errors that can occur while selecting, reconciling or transferring lectures.
#[derive(Error, Debug)]
pub enum Error {
    /// A week range or cutoff date could not be parsed.
    #[error("invalid date range {input:?}: {reason}")]
    RangeParse {
        /// The raw user input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A date falls outside the precomputed teaching term.
    #[error("{date} is outside the teaching term ({first} to {last})")]
    WeekOutOfRange {
        /// The date that was looked up.
        date: NaiveDate,
        /// First day of week 1.
        first: NaiveDate,
        /// Last day of the final week.
        last: NaiveDate,
    },

    /// No archive folder could be found or created for a subject.
    #[error("no folder for {code} under {root}: {reason}")]
    FolderResolution {
        /// Subject code that was searched for.
        code: String,
        /// Archive root that was searched.
        root: PathBuf,
        /// Why resolution failed.
        reason: String,
    },

    /// The feed was not in reverse-chronological order.
    #[error("feed for {code} is not newest-first: {newer} follows {older}")]
    UnsortedFeed {
        /// Subject code of the offending feed.
        code: String,
        /// The earlier entry's timestamp.
        older: NaiveDateTime,
        /// The later entry's (newer) timestamp.
        newer: NaiveDateTime,
    },

    /// A single transfer failed; the partial file is left on disk.
    #[error("transfer of {label} failed: {reason}")]
    Transfer {
        /// Display name of the lecture being transferred.
        label: String,
        /// Underlying cause.
        reason: String,
    },

    /// A retried operation ran out of attempts.
    #[error("{operation} failed after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        /// What was being attempted.
        operation: String,
        /// How many attempts were made.
        attempts: u32,
        /// The final attempt's error.
        last_error: String,
    },

    /// The transfer queue no longer accepts jobs.
    #[error("transfer queue is closed")]
    QueueClosed,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed recording feed.
    #[error("feed error: {0}")]
    Feed(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether this error only affects the current subject, leaving the
    /// rest of the run intact.
    #[must_use]
    pub const fn is_subject_fatal(&self) -> bool {
        matches!(
            self,
            Self::RangeParse { .. }
                | Self::WeekOutOfRange { .. }
                | Self::FolderResolution { .. }
                | Self::UnsortedFeed { .. }
        )
    }

    /// The message followed by every underlying cause it does not already
    /// spell out, joined with `": "`.
    #[must_use]
    pub fn full_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        message
    }
}

/// A specialized `Result` type for lecture-dl operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_fatal_classification() {
        let folder = Error::FolderResolution {
            code: "COMP10001".into(),
            root: PathBuf::from("/uni"),
            reason: "missing".into(),
        };
        assert!(folder.is_subject_fatal());
        assert!(!Error::QueueClosed.is_subject_fatal());
        assert!(
            !Error::Transfer {
                label: "x".into(),
                reason: "y".into()
            }
            .is_subject_fatal()
        );
    }

    #[derive(Debug, Error)]
    #[error("operation timed out")]
    struct TimedOut;

    #[derive(Debug, Error)]
    #[error("error decoding response body")]
    struct Decode(#[source] TimedOut);

    #[test]
    fn full_message_walks_the_cause_chain() {
        let err = Error::Io(std::io::Error::other(Decode(TimedOut)));
        assert_eq!(err.to_string(), "I/O error: error decoding response body");
        assert_eq!(
            err.full_message(),
            "I/O error: error decoding response body: operation timed out"
        );
        assert_eq!(Error::QueueClosed.full_message(), "transfer queue is closed");
    }

    #[test]
    fn messages_name_the_input() {
        let err = Error::RangeParse {
            input: "3-x".into(),
            reason: "not a week number".into(),
        };
        assert!(err.to_string().contains("\"3-x\""));
    }
}
