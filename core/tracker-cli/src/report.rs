//! `stats`: run one analysis pass and print the result.

use crate::CliError;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracker_core::{
    analyze_blocking, AnalysisError, AnalysisResult, Category, EventAnalyzer, EventKind,
    Statistics, StatsConfig, ThreadRunner, TrackerLog,
};

pub fn run(
    log: Arc<TrackerLog>,
    config: &StatsConfig,
    json: bool,
    top: usize,
) -> Result<(), CliError> {
    let max_bytes = log.config().max_bytes_to_process;
    let analyzer = EventAnalyzer::new(Arc::clone(&log), ThreadRunner::default())
        .with_idle_threshold(config.idle_threshold());

    match analyze_blocking(&analyzer).ok_or(CliError::AnalysisDropped)? {
        AnalysisResult::Ok { stats, errors } => {
            log_errors(&errors);
            if json {
                println!("{}", serde_json::to_string_pretty(&stats.report())?);
            } else {
                print!("{}", render_text(&stats, errors.len(), top));
            }
        }
        AnalysisResult::AlreadyRunning => {
            println!("Analysis is already running.");
        }
        AnalysisResult::DataTooLarge => {
            println!(
                "Activity log is too large to process ({} bytes, limit {} bytes). \
                 Roll or clear it first.",
                log.size_in_bytes(),
                max_bytes
            );
        }
    }
    Ok(())
}

fn log_errors(errors: &[AnalysisError]) {
    for error in errors {
        tracing::warn!(error = %error.message, "Skipped unreadable log line");
    }
}

const DURATION_CATEGORIES: [(Category, &str); 3] = [
    (Category::Project, "Time by project"),
    (Category::File, "Time by file"),
    (Category::Task, "Time by task"),
];

const COUNT_CATEGORIES: [(Category, &str); 4] = [
    (Category::Action, "Top actions"),
    (Category::Key, "Top keys"),
    (Category::Mouse, "Top mouse actions"),
    (Category::Component, "Top components"),
];

/// Plain-text report. Sections with no entries are left out.
pub fn render_text(stats: &Statistics, error_count: usize, top: usize) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Events: {}", stats.total_events());
    if let (Some(first), Some(last)) = (stats.first_event(), stats.last_event()) {
        let _ = writeln!(out, "Range: {} .. {}", first.to_rfc3339(), last.to_rfc3339());
    }
    let _ = writeln!(
        out,
        "Active time: {} over {} session(s)",
        format_duration(stats.active_time()),
        stats.sessions().len()
    );
    for kind in EventKind::ALL {
        let count = stats.count_of_kind(kind);
        if count > 0 {
            let _ = writeln!(out, "  {kind}: {count}");
        }
    }
    if error_count > 0 {
        let _ = writeln!(
            out,
            "Skipped {error_count} unreadable line(s); see the diagnostics log for details."
        );
    }

    for (category, title) in DURATION_CATEGORIES {
        let entries = stats.top_by_duration(category, top);
        if entries.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{title}:");
        for (name, aggregate) in entries {
            let _ = writeln!(
                out,
                "  {:>10}  {name}",
                format_duration(aggregate.total_duration)
            );
        }
    }

    for (category, title) in COUNT_CATEGORIES {
        let entries = stats.top(category, top);
        if entries.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{title}:");
        for (name, aggregate) in entries {
            let _ = writeln!(out, "  {:>6}  {name}", aggregate.count);
        }
    }

    out
}

/// `1h 02m 03s`, `4m 05s` or `7s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
