//! Recording feeds produced by the LMS automation layer.
//!
//! The automation layer that drives the lecture-capture player writes one
//! JSON document listing every enrolled subject and its recordings, newest
//! first. This module loads that document into [`SubjectFeed`]s.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An enrolled subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject code, e.g. `COMP10001`.
    pub code: String,
    /// Human-readable subject name.
    pub name: String,
}

impl Subject {
    /// Creates a subject.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// One lecture-capture entry as exposed by the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecording {
    /// Direct link to the media file.
    pub access_link: String,
    /// When the lecture was captured (local time).
    pub captured_at: NaiveDateTime,
    /// 1-based position in the listing, counted from the oldest recording.
    pub sequence_index: usize,
}

/// A subject together with its recordings, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectFeed {
    /// The subject.
    pub subject: Subject,
    /// Recordings in reverse-chronological order.
    pub recordings: Vec<RemoteRecording>,
}

#[derive(Debug, Deserialize)]
struct RawSubject {
    code: String,
    name: String,
    #[serde(default)]
    recordings: Vec<RawRecording>,
}

#[derive(Debug, Deserialize)]
struct RawRecording {
    link: String,
    #[serde(default)]
    captured_at: Option<NaiveDateTime>,
    #[serde(default)]
    listing_date: Option<String>,
    #[serde(default)]
    sequence: Option<usize>,
}

/// Parses a feed document. `year` dates listings that omit the year.
///
/// # Errors
///
/// Returns [`Error::Feed`] if the JSON is malformed or a recording has no
/// usable timestamp.
pub fn parse_feed(json: &str, year: i32) -> Result<Vec<SubjectFeed>> {
    let raw: Vec<RawSubject> =
        serde_json::from_str(json).map_err(|e| Error::Feed(format!("invalid feed: {e}")))?;

    raw.into_iter()
        .map(|subject| {
            let count = subject.recordings.len();
            let recordings = subject
                .recordings
                .into_iter()
                .enumerate()
                .map(|(position, rec)| {
                    let captured_at = match (rec.captured_at, rec.listing_date.as_deref()) {
                        (Some(at), _) => at,
                        (None, Some(text)) => parse_listing_date(text, year)?,
                        (None, None) => {
                            return Err(Error::Feed(format!(
                                "{}: recording {} has neither captured_at nor listing_date",
                                subject.code, rec.link
                            )));
                        }
                    };
                    Ok(RemoteRecording {
                        access_link: rec.link,
                        captured_at,
                        sequence_index: rec.sequence.unwrap_or(count - position),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(SubjectFeed {
                subject: Subject::new(subject.code, subject.name),
                recordings,
            })
        })
        .collect()
}

/// Loads a feed document from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_feed(path: &Path, year: i32) -> Result<Vec<SubjectFeed>> {
    let json = std::fs::read_to_string(path)?;
    let feeds = parse_feed(&json, year)?;
    log::info!("Loaded {} subject(s) from {}", feeds.len(), path.display());
    Ok(feeds)
}

/// Parses a player listing such as `August 02 3:20 PM` or `02 August 3:20 PM`.
///
/// The listing carries no year, so `year` is supplied.
///
/// # Errors
///
/// Returns [`Error::Feed`] if the text matches neither layout.
pub fn parse_listing_date(text: &str, year: i32) -> Result<NaiveDateTime> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(Error::Feed(format!("unrecognised listing date {text:?}")));
    }
    let (date, time) = tokens.split_at(tokens.len() - 2);
    let normalised = format!("{} {year} {}", date.join(" "), time.join(" "));

    ["%d %B %Y %I:%M %p", "%B %d %Y %I:%M %p"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalised, format).ok())
        .ok_or_else(|| Error::Feed(format!("unrecognised listing date {text:?}")))
}

/// Keeps the subjects chosen by a 1-based list such as `1,3`. An empty
/// choice keeps every subject.
///
/// # Errors
///
/// Returns [`Error::Config`] for tokens that are not valid subject numbers.
pub fn select_subjects(feeds: Vec<SubjectFeed>, choices: &str) -> Result<Vec<SubjectFeed>> {
    if choices.trim().is_empty() {
        return Ok(feeds);
    }

    let mut wanted = choices
        .split(',')
        .map(|token| {
            token
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=feeds.len()).contains(n))
                .ok_or_else(|| {
                    Error::Config(format!(
                        "subject choice {:?} is not between 1 and {}",
                        token.trim(),
                        feeds.len()
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;
    wanted.sort_unstable();
    wanted.dedup();

    Ok(feeds
        .into_iter()
        .enumerate()
        .filter(|(index, _)| wanted.binary_search(&(index + 1)).is_ok())
        .map(|(_, feed)| feed)
        .collect())
}
