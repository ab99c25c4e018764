//! activity-tracker: command-line front end for the activity log.
//!
//! Stands where the IDE menu would: records events, shows statistics and
//! manages the current log file.
//!
//! ## Subcommands
//!
//! - `record`: Append one event to the current log
//! - `stats`: Analyze the log and print statistics
//! - `roll`: Move the current log aside and start a fresh one
//! - `clear`: Empty the current log
//! - `status`: Show log location, size and tracking settings
//! - `path`: Print the current log file (or its folder)

mod logging;
mod manage;
mod record;
mod report;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracker_core::{EventKind, LogRotationError, LogWriteError, TrackerError, TrackerLog};

#[derive(Parser)]
#[command(name = "activity-tracker")]
#[command(about = "Record and analyze developer activity")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.activity-tracker/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append one event to the current log
    Record {
        #[arg(value_enum)]
        kind: KindArg,

        /// Payload attribute, repeatable (e.g. -a action=Build -a project=tracker)
        #[arg(short = 'a', long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,

        /// Event time as RFC 3339 (default: now)
        #[arg(long, value_name = "TIMESTAMP")]
        at: Option<String>,

        /// Record even if tracking settings exclude this kind
        #[arg(long)]
        force: bool,
    },

    /// Analyze the log and print statistics
    Stats {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Entries shown per category
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Move the current log into a numbered file and start a fresh one
    Roll,

    /// Empty the current log (cannot be undone)
    Clear {
        /// Confirm clearing
        #[arg(long)]
        yes: bool,
    },

    /// Show log location, size and tracking settings
    Status,

    /// Print the current log file path
    Path {
        /// Print the containing folder instead
        #[arg(long)]
        folder: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    IdeAction,
    KeyPress,
    MouseAction,
    IdeState,
}

impl From<KindArg> for EventKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::IdeAction => EventKind::IdeAction,
            KindArg::KeyPress => EventKind::KeyPress,
            KindArg::MouseAction => EventKind::MouseAction,
            KindArg::IdeState => EventKind::IdeState,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Write(#[from] LogWriteError),

    #[error(transparent)]
    Rotation(#[from] LogRotationError),

    #[error("Invalid attribute {0:?}, expected KEY=VALUE")]
    InvalidAttribute(String),

    #[error("Invalid timestamp {value:?}: {details}")]
    InvalidTimestamp { value: String, details: String },

    #[error("Failed to render report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Analysis task was dropped before it completed")]
    AnalysisDropped,

    #[error("Refusing to clear the tracking log without --yes")]
    ConfirmationRequired,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "activity-tracker failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = tracker_core::load_config(cli.config.as_deref())?;
    let log = Arc::new(TrackerLog::from_config(&config)?);

    match cli.command {
        Commands::Record {
            kind,
            attrs,
            at,
            force,
        } => record::run(&log, &config.tracking, kind.into(), &attrs, at.as_deref(), force),
        Commands::Stats { json, top } => report::run(log, &config.stats, json, top),
        Commands::Roll => manage::roll(&log),
        Commands::Clear { yes } => manage::clear(&log, yes),
        Commands::Status => manage::status(&log, &config),
        Commands::Path { folder } => {
            manage::path(&log, folder);
            Ok(())
        }
    }
}
