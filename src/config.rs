//! Configuration for archive layout, naming, date selection and transfers.
//!
//! Every setting has an explicit default, so a missing or partial
//! `config.toml` is always usable. [`Config::validate`] runs once at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::naming::NameTemplate;
use crate::retry::RetryPolicy;

/// Which media variant of a recording to archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video recording (`.m4v`).
    #[default]
    Video,
    /// Audio-only recording (`.mp3`).
    Audio,
}

impl MediaKind {
    /// File extension used for this media kind, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Video => "m4v",
            Self::Audio => "mp3",
        }
    }
}

/// What to do with an existing local file when the server does not report a size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownSizePolicy {
    /// Treat the local file as complete and skip it.
    #[default]
    AssumeComplete,
    /// Download the whole recording again, overwriting the local file.
    Redownload,
}

/// Where lectures are stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Root folder containing one folder per subject.
    pub root: PathBuf,
    /// Folder inside each subject folder that holds the recordings.
    pub lecture_subfolder: String,
    /// Create missing subject folders instead of failing.
    pub auto_create_subfolders: bool,
    /// Template for auto-created subject folders (`{code}`, `{name}`).
    pub subject_folder_format: String,
    /// Use the user's downloads folder if `root` does not exist.
    pub fallback_to_downloads: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: downloads_dir(),
            lecture_subfolder: "Lectures".to_string(),
            auto_create_subfolders: true,
            subject_folder_format: "{code} - {name}".to_string(),
            fallback_to_downloads: true,
        }
    }
}

/// How recordings are named.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Template for the file stem (`{code}`, `{name}`, `{week}`, `{ordinal}`).
    pub lecture_format: String,
    /// Media variant, which also decides the file extension.
    pub media: MediaKind,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            lecture_format: "{code} Week {week:02} Lecture {ordinal}".to_string(),
            media: MediaKind::default(),
        }
    }
}

/// Which recordings to consider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Week list (`1,3,4`), week span (`1-5`) or cutoff date (`dd/mm/yyyy`).
    pub date_range: String,
    /// Replace the range with "current week to final week".
    pub update_lower_week: bool,
    /// 1-based subject numbers (`1,3`); empty selects every subject.
    pub subjects: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            date_range: "1-12".to_string(),
            update_lower_week: false,
            subjects: String::new(),
        }
    }
}

/// Semester boundaries used to number teaching weeks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Academic year. Also used to date listings that omit the year.
    pub year: i32,
    /// First day of orientation week; defaults to 17 July of `year`.
    pub week0_start: Option<NaiveDate>,
    /// Last day of orientation week; defaults to 23 July of `year`.
    pub week0_end: Option<NaiveDate>,
    /// Number of teaching weeks.
    pub week_count: u8,
    /// The break follows this week. 0 disables the break.
    pub break_after_week: u8,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self::for_year(Local::now().year())
    }
}

impl CalendarConfig {
    /// The usual second-semester layout for `year`.
    #[must_use]
    pub const fn for_year(year: i32) -> Self {
        Self {
            year,
            week0_start: None,
            week0_end: None,
            week_count: 12,
            break_after_week: 9,
        }
    }

    /// First and last day of orientation week.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `year` has no such dates.
    pub fn orientation_week(&self) -> Result<(NaiveDate, NaiveDate)> {
        let start = match self.week0_start {
            Some(date) => date,
            None => NaiveDate::from_ymd_opt(self.year, 7, 17)
                .ok_or_else(|| Error::Config(format!("invalid year {}", self.year)))?,
        };
        let end = self.week0_end.unwrap_or(start + TimeDelta::days(6));
        Ok((start, end))
    }

    /// Checks that the boundaries describe a usable semester.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let (start, end) = self.orientation_week()?;
        if end < start {
            return Err(Error::Config(format!(
                "week0_end {end} is before week0_start {start}"
            )));
        }
        if end - start >= TimeDelta::days(7) {
            return Err(Error::Config(format!(
                "orientation week {start} to {end} is longer than 7 days"
            )));
        }
        if self.week_count == 0 {
            return Err(Error::Config("week_count must be at least 1".to_string()));
        }
        if self.break_after_week >= self.week_count {
            return Err(Error::Config(format!(
                "break_after_week {} must be below week_count {}",
                self.break_after_week, self.week_count
            )));
        }
        Ok(())
    }
}

/// Transfer and reconciliation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Maximum bytes written to disk per chunk.
    pub chunk_size: usize,
    /// Policy for existing files whose remote size is unknown.
    pub unknown_size: UnknownSizePolicy,
    /// Reject feeds that are not newest-first instead of trusting them.
    pub strict_feed_order: bool,
    /// Attempts for size lookups and for opening a transfer.
    pub retry_attempts: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub retry_delay_ms: u64,
    /// Connect timeout, and the longest a transfer may stall between reads.
    pub timeout_secs: u64,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            unknown_size: UnknownSizePolicy::default(),
            strict_feed_order: false,
            retry_attempts: 3,
            retry_delay_ms: 500,
            timeout_secs: 60,
            user_agent: concat!("lecture-dl/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TransferConfig {
    /// Retry policy built from the configured attempts and delay.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_delay_ms))
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Archive layout.
    pub archive: ArchiveConfig,
    /// Naming.
    pub naming: NamingConfig,
    /// Date and subject selection.
    pub selection: SelectionConfig,
    /// Semester calendar.
    pub calendar: CalendarConfig,
    /// Transfers.
    pub transfer: TransferConfig,
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the configuration file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lecture-dl")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Loads configuration from `path`, falling back to defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            log::info!("Loading config from {}", path.display());
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validates the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        NameTemplate::parse(&self.naming.lecture_format)?;
        NameTemplate::parse_subject(&self.archive.subject_folder_format)?;
        if self.archive.lecture_subfolder.trim().is_empty() {
            return Err(Error::Config("lecture_subfolder cannot be empty".to_string()));
        }
        self.calendar.validate()?;
        if self.transfer.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".to_string()));
        }
        if self.transfer.retry_attempts == 0 {
            return Err(Error::Config(
                "retry_attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the archive root.
    #[must_use]
    pub fn with_archive_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.archive.root = root.into();
        self
    }

    /// Sets the date range expression.
    #[must_use]
    pub fn with_date_range(mut self, range: impl Into<String>) -> Self {
        self.selection.date_range = range.into();
        self
    }

    /// Sets the subject selection.
    #[must_use]
    pub fn with_subjects(mut self, subjects: impl Into<String>) -> Self {
        self.selection.subjects = subjects.into();
        self
    }

    /// Sets the media kind.
    #[must_use]
    pub const fn with_media(mut self, media: MediaKind) -> Self {
        self.naming.media = media;
        self
    }

    /// Sets the semester calendar.
    #[must_use]
    pub const fn with_calendar(mut self, calendar: CalendarConfig) -> Self {
        self.calendar = calendar;
        self
    }

    /// Sets whether the range starts at the current week.
    #[must_use]
    pub const fn with_update_lower_week(mut self, enabled: bool) -> Self {
        self.selection.update_lower_week = enabled;
        self
    }

    /// Sets the unknown-size policy.
    #[must_use]
    pub const fn with_unknown_size(mut self, policy: UnknownSizePolicy) -> Self {
        self.transfer.unknown_size = policy;
        self
    }
}

/// The user's downloads folder, or `./Downloads` if it cannot be determined.
#[must_use]
pub fn downloads_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.archive.lecture_subfolder, "Lectures");
        assert!(config.archive.auto_create_subfolders);
        assert_eq!(config.selection.date_range, "1-12");
        assert_eq!(config.calendar.week_count, 12);
        assert_eq!(config.calendar.break_after_week, 9);
        assert_eq!(config.transfer.unknown_size, UnknownSizePolicy::AssumeComplete);
        config.validate().unwrap();
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .with_archive_root("/uni")
            .with_date_range("3")
            .with_media(MediaKind::Audio)
            .with_subjects("1,2")
            .with_update_lower_week(true)
            .with_unknown_size(UnknownSizePolicy::Redownload);

        assert_eq!(config.archive.root, PathBuf::from("/uni"));
        assert_eq!(config.selection.date_range, "3");
        assert_eq!(config.naming.media, MediaKind::Audio);
        assert_eq!(config.selection.subjects, "1,2");
        assert!(config.selection.update_lower_week);
        assert_eq!(config.transfer.unknown_size, UnknownSizePolicy::Redownload);
    }

    #[test]
    fn media_extensions() {
        assert_eq!(MediaKind::Video.extension(), "m4v");
        assert_eq!(MediaKind::Audio.extension(), "mp3");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [archive]
            root = "/home/me/Uni"

            [naming]
            media = "audio"

            [calendar]
            year = 2017

            [transfer]
            unknown_size = "redownload"
            "#,
        )
        .unwrap();

        assert_eq!(config.archive.root, PathBuf::from("/home/me/Uni"));
        assert_eq!(config.archive.lecture_subfolder, "Lectures");
        assert_eq!(config.naming.media, MediaKind::Audio);
        assert_eq!(config.calendar.year, 2017);
        assert_eq!(config.calendar.week_count, 12);
        assert_eq!(config.transfer.unknown_size, UnknownSizePolicy::Redownload);
        assert_eq!(config.transfer.chunk_size, 64 * 1024);
    }

    #[test]
    fn orientation_week_defaults_from_year() {
        let (start, end) = CalendarConfig::for_year(2017).orientation_week().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2017, 7, 17).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2017, 7, 23).unwrap());
    }

    #[test]
    fn invalid_calendar_rejected() {
        let config = CalendarConfig {
            break_after_week: 12,
            ..CalendarConfig::for_year(2017)
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = CalendarConfig {
            week0_end: NaiveDate::from_ymd_opt(2017, 7, 1),
            ..CalendarConfig::for_year(2017)
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_settings_rejected() {
        let mut config = Config::default();
        config.transfer.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.naming.lecture_format = "{code} {bogus}".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transfer.retry_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn serializes_to_toml() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.naming.lecture_format, config.naming.lecture_format);
        assert_eq!(deserialized.transfer.retry_attempts, config.transfer.retry_attempts);
    }

    #[test]
    fn load_or_default_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.selection.date_range, "1-12");
    }

    #[test]
    fn load_rejects_malformed_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[archive\nroot = ").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
