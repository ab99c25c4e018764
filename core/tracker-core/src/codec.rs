//! Line codec for the tracking log.
//!
//! Every event is one JSON object on one line:
//!
//! ```text
//! {"ts":"2026-10-19T09:30:00.125Z","kind":"ide_action","data":{"action":"Build","project":"tracker"}}
//! ```
//!
//! JSON string escaping turns any `\n`/`\r` inside payload values into escape
//! sequences, so one line is always exactly one record. Timestamps are RFC 3339
//! in UTC with as many fractional digits as needed to round-trip exactly; years
//! outside 0000..=9999 carry an explicit sign.

use crate::error::DecodeError;
use crate::event::{Event, EventKind};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outside years 0000..=9999 chrono writes a signed, expanded year
/// (`-0001-…`, `+10000-…`), which strict RFC 3339 parsing refuses.
const EXPANDED_YEAR_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Serialize)]
struct WireRecordRef<'a> {
    ts: String,
    kind: &'a str,
    data: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireRecord {
    ts: String,
    kind: String,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

/// Serializes an event to a single log line (without the trailing newline).
pub fn encode(event: &Event) -> String {
    let record = WireRecordRef {
        ts: event
            .timestamp()
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        kind: event.kind().tag(),
        data: event.payload(),
    };
    // String fields and a string-keyed map have no failing serialization path.
    serde_json::to_string(&record).unwrap_or_else(|err| {
        tracing::error!(error = %err, "Failed to encode tracking event");
        String::new()
    })
}

/// Parses one log line back into an event.
///
/// A trailing `\r` is tolerated so logs edited on Windows still decode.
pub fn decode(line: &str) -> Result<Event, DecodeError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let record: WireRecord =
        serde_json::from_str(line).map_err(|err| DecodeError::Malformed {
            details: err.to_string(),
        })?;

    let kind = record
        .kind
        .parse::<EventKind>()
        .map_err(DecodeError::UnknownKind)?;
    let timestamp = parse_timestamp(&record.ts)?;

    Ok(Event::with_payload(timestamp, kind, record.data))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DecodeError> {
    let strict_err = match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => return Ok(ts.with_timezone(&Utc)),
        Err(err) => err,
    };

    let expanded = value
        .strip_suffix('Z')
        .filter(|body| body.starts_with(['+', '-']))
        .and_then(|body| NaiveDateTime::parse_from_str(body, EXPANDED_YEAR_FORMAT).ok());
    match expanded {
        Some(naive) => Ok(naive.and_utc()),
        None => Err(DecodeError::InvalidTimestamp {
            value: value.to_string(),
            details: strict_err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::attr;
    use chrono::{TimeZone, Timelike};

    fn ts(secs: i64, nanos: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, nanos).unwrap()
    }

    #[test]
    fn encodes_single_line_with_fixed_field_order() {
        let event = Event::ide_action(ts(1, 0), "Build");
        assert_eq!(
            encode(&event),
            r#"{"ts":"1970-01-01T00:00:01Z","kind":"ide_action","data":{"action":"Build"}}"#
        );
    }

    #[test]
    fn round_trips_awkward_payloads() {
        let events = [
            Event::ide_state(ts(1_760_000_000, 123_456_789)),
            Event::key_press(ts(2, 0), "\n"),
            Event::mouse_action(ts(3, 1), "click")
                .with_attr(attr::FILE, "C:\\work\\\"quoted\".rs")
                .with_attr(attr::COMPONENT, "Editor\r\nGutter\u{2028}")
                .with_attr("emoji", "🦀"),
            Event::ide_action(ts(4, 0), ""),
        ];

        for event in events {
            let line = encode(&event);
            assert!(!line.contains('\n') && !line.contains('\r'), "{line}");
            assert_eq!(decode(&line), Ok(event));
        }
    }

    #[test]
    fn round_trips_years_outside_four_digits() {
        let events = [
            Event::ide_action(Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap(), "Build"),
            Event::ide_action(Utc.with_ymd_and_hms(-1, 1, 1, 0, 0, 0).unwrap(), "Build"),
            Event::ide_state(Utc.with_ymd_and_hms(-4, 2, 29, 12, 30, 0).unwrap()),
            Event::ide_state(DateTime::<Utc>::MIN_UTC),
            Event::ide_state(DateTime::<Utc>::MAX_UTC),
        ];

        for event in events {
            let line = encode(&event);
            assert_eq!(decode(&line), Ok(event), "{line}");
        }
    }

    #[test]
    fn round_trips_leap_second() {
        let leap = Utc
            .with_ymd_and_hms(2016, 12, 31, 23, 59, 59)
            .unwrap()
            .with_nanosecond(1_500_000_000)
            .unwrap();
        let event = Event::ide_state(leap);
        assert_eq!(decode(&encode(&event)), Ok(event));
    }

    #[test]
    fn signed_year_without_utc_suffix_is_rejected() {
        let err = decode(r#"{"ts":"+10000-01-01T00:00:00+01:00","kind":"ide_state"}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTimestamp { .. }));
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let event = Event::key_press(ts(5, 0), "a");
        let line = format!("{}\r", encode(&event));
        assert_eq!(decode(&line), Ok(event));
    }

    #[test]
    fn missing_data_decodes_to_empty_payload() {
        let event = decode(r#"{"ts":"1970-01-01T00:00:07Z","kind":"ide_state"}"#).unwrap();
        assert_eq!(event, Event::ide_state(ts(7, 0)));
    }

    #[test]
    fn truncated_line_is_malformed() {
        let line = encode(&Event::ide_action(ts(1, 0), "Build"));
        let fragment = &line[..line.len() / 2];
        assert!(matches!(
            decode(fragment),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(decode(""), Err(DecodeError::Malformed { .. })));
    }

    #[test]
    fn unknown_kind_is_reported_by_tag() {
        let err = decode(r#"{"ts":"1970-01-01T00:00:01Z","kind":"vcs","data":{}}"#).unwrap_err();
        assert_eq!(err, DecodeError::UnknownKind("vcs".to_string()));
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let err = decode(r#"{"ts":"yesterday","kind":"ide_state","data":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTimestamp { ref value, .. } if value == "yesterday"));
    }

    #[test]
    fn non_string_payload_values_are_malformed() {
        let err = decode(r#"{"ts":"1970-01-01T00:00:01Z","kind":"ide_state","data":{"line":3}}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }
}
