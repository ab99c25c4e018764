//! Activity events as recorded in the tracking log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Well-known payload attribute keys.
pub mod attr {
    pub const ACTION: &str = "action";
    pub const KEY: &str = "key";
    pub const MOUSE: &str = "mouse";
    pub const COMPONENT: &str = "component";
    pub const FILE: &str = "file";
    pub const PROJECT: &str = "project";
    pub const PSI_PATH: &str = "psi_path";
    pub const LINE: &str = "line";
    pub const COLUMN: &str = "column";
    pub const TASK: &str = "task";
    pub const USER: &str = "user";
}

/// What kind of activity an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An IDE action was invoked (build, save, refactor...).
    IdeAction,
    /// A key was pressed.
    KeyPress,
    /// A mouse button or wheel action.
    MouseAction,
    /// Periodic snapshot of the editor state.
    IdeState,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::IdeAction,
        EventKind::KeyPress,
        EventKind::MouseAction,
        EventKind::IdeState,
    ];

    /// Tag written to the log for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            EventKind::IdeAction => "ide_action",
            EventKind::KeyPress => "key_press",
            EventKind::MouseAction => "mouse_action",
            EventKind::IdeState => "ide_state",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// One recorded unit of developer activity.
///
/// Events are values: the builder methods consume `self` and return a new
/// event, nothing mutates an event after it has been handed to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    timestamp: DateTime<Utc>,
    kind: EventKind,
    payload: BTreeMap<String, String>,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            timestamp,
            kind,
            payload: BTreeMap::new(),
        }
    }

    pub fn with_payload(
        timestamp: DateTime<Utc>,
        kind: EventKind,
        payload: BTreeMap<String, String>,
    ) -> Self {
        Self {
            timestamp,
            kind,
            payload,
        }
    }

    pub fn ide_action(timestamp: DateTime<Utc>, action_id: impl Into<String>) -> Self {
        Self::new(timestamp, EventKind::IdeAction).with_attr(attr::ACTION, action_id)
    }

    pub fn key_press(timestamp: DateTime<Utc>, key: impl Into<String>) -> Self {
        Self::new(timestamp, EventKind::KeyPress).with_attr(attr::KEY, key)
    }

    pub fn mouse_action(timestamp: DateTime<Utc>, action: impl Into<String>) -> Self {
        Self::new(timestamp, EventKind::MouseAction).with_attr(attr::MOUSE, action)
    }

    pub fn ide_state(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, EventKind::IdeState)
    }

    /// Returns a copy of this event with one more payload attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &BTreeMap<String, String> {
        &self.payload
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.payload
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}
