//! Runtime configuration for the tracker.
//!
//! Loaded from `~/.activity-tracker/config.toml`. Every field has a default so
//! a missing file, or a file that only sets a couple of keys, is valid:
//!
//! ```toml
//! [log]
//! dir = "/tmp/activity"
//! file_stem = "ide-events"
//! extension = "jsonl"
//! max_bytes_to_process = 209715200
//! read_scope = "current_file"   # or "all_files"
//!
//! [stats]
//! idle_threshold_secs = 300
//!
//! [tracking]
//! enabled = true
//! poll_ide_state = true
//! track_ide_actions = true
//! track_keyboard = false
//! track_mouse = false
//! ```

use crate::error::{Result, TrackerError};
use crate::event::EventKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory under the home directory holding config, logs and diagnostics.
pub const TRACKER_DIR_NAME: &str = ".activity-tracker";

/// Config file name within the tracker directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Logs above this size are refused by the analyzer (200 MiB).
pub const DEFAULT_MAX_BYTES_TO_PROCESS: u64 = 200 * 1024 * 1024;

/// Gaps longer than this end an activity session.
pub const DEFAULT_IDLE_THRESHOLD_SECS: u64 = 5 * 60;

/// Which log files a read (and the size gate) covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadScope {
    /// Only the file currently receiving appends.
    #[default]
    CurrentFile,
    /// Rolled files in sequence order, followed by the current file.
    AllFiles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log directory; `~/.activity-tracker/logs` when unset.
    pub dir: Option<PathBuf>,
    pub file_stem: String,
    /// File extension without the dot; empty for none.
    pub extension: String,
    pub max_bytes_to_process: u64,
    pub read_scope: ReadScope,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: None,
            file_stem: "ide-events".to_string(),
            extension: "jsonl".to_string(),
            max_bytes_to_process: DEFAULT_MAX_BYTES_TO_PROCESS,
            read_scope: ReadScope::CurrentFile,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub idle_threshold_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: DEFAULT_IDLE_THRESHOLD_SECS,
        }
    }
}

impl StatsConfig {
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }
}

/// Switches handed to event producers.
///
/// The core never consults these itself; producers ask [`TrackingSettings::accepts`]
/// before building an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    pub enabled: bool,
    pub poll_ide_state: bool,
    pub track_ide_actions: bool,
    pub track_keyboard: bool,
    pub track_mouse: bool,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_ide_state: true,
            track_ide_actions: true,
            track_keyboard: false,
            track_mouse: false,
        }
    }
}

impl TrackingSettings {
    pub fn accepts(&self, kind: EventKind) -> bool {
        self.enabled
            && match kind {
                EventKind::IdeAction => self.track_ide_actions,
                EventKind::KeyPress => self.track_keyboard,
                EventKind::MouseAction => self.track_mouse,
                EventKind::IdeState => self.poll_ide_state,
            }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub log: LogConfig,
    pub stats: StatsConfig,
    pub tracking: TrackingSettings,
}

impl TrackerConfig {
    /// Resolves the log directory, falling back to `~/.activity-tracker/logs`.
    pub fn log_dir(&self) -> Result<PathBuf> {
        match &self.log.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(tracker_dir()?.join("logs")),
        }
    }
}

/// Returns `~/.activity-tracker`.
pub fn tracker_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(TRACKER_DIR_NAME))
        .ok_or(TrackerError::HomeDirNotFound)
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(tracker_dir()?.join(CONFIG_FILE_NAME))
}

/// Loads the config from `path` (or the default location).
///
/// A missing file yields defaults; an unreadable or unparsable file is an error.
pub fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No tracker config, using defaults");
        return Ok(TrackerConfig::default());
    }

    let content =
        fs_err::read_to_string(&config_path).map_err(|source| TrackerError::ConfigRead {
            path: config_path.clone(),
            source,
        })?;
    toml::from_str::<TrackerConfig>(&content).map_err(|err| TrackerError::ConfigMalformed {
        path: config_path,
        details: err.to_string(),
    })
}
