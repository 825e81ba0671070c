//! Command-line front end: argument parsing, progress bars and the summary.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    Config, Error, HttpSource, MediaKind, Result, SessionReport, TokioFileSystem, load_feed,
    run_session,
};

use progress::{CliProgress, print_subjects, print_summary};

/// Options given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Subject feed (JSON).
    pub feed: PathBuf,
    /// Config file; the platform default when absent.
    pub config: Option<PathBuf>,
    /// Date range override.
    pub range: Option<String>,
    /// Subject choice override.
    pub subjects: Option<String>,
    /// Archive audio instead of video.
    pub audio: bool,
    /// Archive root override.
    pub output: Option<PathBuf>,
    /// Only the current week onwards.
    pub current: bool,
    /// Debug logging.
    pub verbose: bool,
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print usage and exit.
    Help,
    /// Run a session.
    Run(CliArgs),
}

/// Parses arguments, excluding the program name.
///
/// # Errors
///
/// Returns [`Error::Config`] for unknown options, missing option values, or
/// a missing feed path.
pub fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs::default();
    let mut feed = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => parsed.config = Some(value(&mut args, &arg)?.into()),
            "-r" | "--range" => parsed.range = Some(value(&mut args, &arg)?),
            "-s" | "--subjects" => parsed.subjects = Some(value(&mut args, &arg)?),
            "-o" | "--output" => parsed.output = Some(value(&mut args, &arg)?.into()),
            "-a" | "--audio" => parsed.audio = true,
            "--current" => parsed.current = true,
            "-v" | "--verbose" => parsed.verbose = true,
            "-h" | "--help" => return Ok(Command::Help),
            other if !other.starts_with('-') && feed.is_none() => feed = Some(PathBuf::from(other)),
            other => return Err(Error::Config(format!("unexpected argument: {other}"))),
        }
    }

    parsed.feed = feed.ok_or_else(|| Error::Config("no subject feed given".to_string()))?;
    Ok(Command::Run(parsed))
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| Error::Config(format!("{flag} requires a value")))
}

/// Prints usage to stderr.
pub fn print_usage() {
    eprintln!("Usage: lecture-dl [OPTIONS] <feed.json>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <feed.json>           Subject feed listing every recording");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>   Config file (default: {})", Config::default_path().display());
    eprintln!("  -r, --range <RANGE>   Weeks (1,3,4), a week span (1-5) or a cutoff date (dd/mm/yyyy)");
    eprintln!("  -s, --subjects <N>    Subject numbers to download (1,3); default is all");
    eprintln!("  -o, --output <DIR>    Archive root");
    eprintln!("  -a, --audio           Download audio instead of video");
    eprintln!("      --current         Download from the current week onwards");
    eprintln!("  -v, --verbose         Debug logging");
    eprintln!("  -h, --help            Show this help");
}

/// Loads the config file and layers the command-line overrides on top.
///
/// # Errors
///
/// Returns an error if an explicitly named config file cannot be read or
/// parsed, or if `--range` and `--current` are both given.
pub fn resolve_config(args: &CliArgs) -> Result<Config> {
    if args.range.is_some() && args.current {
        return Err(Error::Config(
            "--range and --current cannot be combined".to_string(),
        ));
    }
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    // An explicit range outranks a config file asking for the current week.
    if let Some(range) = &args.range {
        config = config
            .with_date_range(range.clone())
            .with_update_lower_week(false);
    }
    if let Some(subjects) = &args.subjects {
        config = config.with_subjects(subjects.clone());
    }
    if let Some(root) = &args.output {
        config = config.with_archive_root(root.clone());
    }
    if args.audio {
        config = config.with_media(MediaKind::Audio);
    }
    if args.current {
        config = config.with_update_lower_week(true);
    }
    Ok(config)
}

/// Runs one session against the network and the local disk.
///
/// # Errors
///
/// Returns an error if configuration, the feed, or the whole run fails.
/// Individual subject and transfer failures are part of the report.
pub async fn run(args: &CliArgs) -> Result<SessionReport> {
    let config = resolve_config(args)?;
    let feeds = load_feed(&args.feed, config.calendar.year)?;
    print_subjects(&feeds);

    let source = Arc::new(HttpSource::new(&config.transfer)?);
    let progress = Arc::new(CliProgress::new());
    let today = chrono::Local::now().date_naive();

    let report = run_session(
        &config,
        feeds,
        source,
        Arc::new(TokioFileSystem),
        progress,
        today,
    )
    .await?;

    print_summary(&report);
    Ok(report)
}
