//! `record`: append one event to the current log.

use crate::CliError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracker_core::{Event, EventKind, TrackerLog, TrackingSettings};

pub fn run(
    log: &TrackerLog,
    settings: &TrackingSettings,
    kind: EventKind,
    attrs: &[String],
    at: Option<&str>,
    force: bool,
) -> Result<(), CliError> {
    if !force && !settings.accepts(kind) {
        tracing::info!(kind = %kind, "Tracking disabled for kind, event dropped");
        println!("Tracking is disabled for {kind} events (use --force to record anyway).");
        return Ok(());
    }

    let timestamp = match at {
        Some(value) => parse_timestamp(value)?,
        None => Utc::now(),
    };
    let event = Event::with_payload(timestamp, kind, parse_attrs(attrs)?);

    log.append(&event)?;
    tracing::debug!(
        kind = %kind,
        file = %log.current_log_file().display(),
        "Recorded event"
    );
    Ok(())
}

/// Parses `KEY=VALUE` pairs. Only the first `=` splits, so values may contain `=`.
pub fn parse_attrs(attrs: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    attrs
        .iter()
        .map(|raw| match raw.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(CliError::InvalidAttribute(raw.clone())),
        })
        .collect()
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CliError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| CliError::InvalidTimestamp {
            value: value.to_string(),
            details: err.to_string(),
        })
}
