//! Error types for tracker-core operations.
//!
//! Store-level failures are split by the operation that raised them so callers
//! can tell a failed append from a failed roll/clear. Decode failures are
//! per-line and never escape an analysis pass.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Per-record Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// A single log line that could not be turned back into an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed record: {details}")]
    Malformed { details: String },

    #[error("Unknown event kind: {0}")]
    UnknownKind(String),

    #[error("Invalid timestamp {value:?}: {details}")]
    InvalidTimestamp { value: String, details: String },

    #[error("Unreadable line: {details}")]
    Unreadable { details: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Log Store Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failure while appending an event to the current log file.
#[derive(Debug, thiserror::Error)]
pub enum LogWriteError {
    #[error("Failed to append to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Event at {attempted} is older than the last logged event at {last}")]
    OutOfOrder {
        last: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },
}

/// Failure while rolling or clearing the current log file.
///
/// Whenever one of these is returned the previously logged content is still
/// on disk under either its old or its new name.
#[derive(Debug, thiserror::Error)]
pub enum LogRotationError {
    #[error("Failed to prepare {path} for rotation: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to roll {from} into {to}: {source}")]
    Roll {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to clear {path}: {source}")]
    Clear {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Crate Error
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors that can occur in tracker-core operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Log Store Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    Write(#[from] LogWriteError),

    #[error(transparent)]
    Rotation(#[from] LogRotationError),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using TrackerError.
pub type Result<T> = std::result::Result<T, TrackerError>;

impl From<TrackerError> for String {
    fn from(err: TrackerError) -> String {
        err.to_string()
    }
}
