//! Diagnostics logging for the command-line front end.
//!
//! Everything at the configured level goes to a daily-rolled file under
//! `~/.activity-tracker/diagnostics/`; warnings and errors are echoed to
//! stderr. `ACTIVITY_TRACKER_DEBUG_LOG=1` forces debug level, otherwise
//! `RUST_LOG` applies with `info` as the fallback.

use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEBUG_ENV: &str = "ACTIVITY_TRACKER_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "activity-tracker.log";

/// Installs the global subscriber. Keep the returned guard alive for the
/// lifetime of the process so buffered lines reach the file.
pub fn init() -> Option<WorkerGuard> {
    let Some(dir) = diagnostics_dir() else {
        let _ = tracing_subscriber::registry()
            .with(stderr_layer())
            .try_init();
        return None;
    };

    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(UtcTime::rfc_3339())
        .with_filter(env_filter());

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer())
        .try_init();
    Some(guard)
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(LevelFilter::WARN)
}

fn env_filter() -> EnvFilter {
    if debug_enabled(env::var(DEBUG_ENV).ok().as_deref()) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn debug_enabled(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}

fn diagnostics_dir() -> Option<std::path::PathBuf> {
    let dir = tracker_core::tracker_dir().ok()?.join("diagnostics");
    fs_err::create_dir_all(&dir).ok()?;
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_values() {
        assert!(debug_enabled(Some("1")));
        assert!(debug_enabled(Some("yes")));
        assert!(!debug_enabled(Some("0")));
        assert!(!debug_enabled(None));
    }
}
