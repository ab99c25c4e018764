//! Aggregate statistics over tracked events.
//!
//! Counting is order-independent. Time is derived from consecutive
//! timestamps: the gap between one distinct timestamp and the next is
//! credited to the files, projects and tasks seen at the earlier timestamp,
//! provided the gap does not exceed the idle threshold. Longer gaps close the
//! current session and open a new one. Events that share a timestamp are
//! merged as a set, so their relative order never changes the result.

use crate::config::DEFAULT_IDLE_THRESHOLD_SECS;
use crate::event::{attr, Event, EventKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Dimension a statistic is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Kind,
    Action,
    Key,
    Mouse,
    Component,
    File,
    Project,
    Task,
}

impl Category {
    /// Whether time is credited to keys of this category.
    pub fn tracks_duration(self) -> bool {
        matches!(self, Category::File | Category::Project | Category::Task)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CategoryKey {
    pub category: Category,
    pub name: String,
}

impl CategoryKey {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    pub fn kind(kind: EventKind) -> Self {
        Self::new(Category::Kind, kind.tag())
    }

    /// All keys an event contributes to.
    fn for_event(event: &Event) -> Vec<CategoryKey> {
        const ATTRIBUTE_CATEGORIES: [(&str, Category); 7] = [
            (attr::ACTION, Category::Action),
            (attr::KEY, Category::Key),
            (attr::MOUSE, Category::Mouse),
            (attr::COMPONENT, Category::Component),
            (attr::FILE, Category::File),
            (attr::PROJECT, Category::Project),
            (attr::TASK, Category::Task),
        ];

        let mut keys = vec![CategoryKey::kind(event.kind())];
        keys.extend(
            ATTRIBUTE_CATEGORIES
                .iter()
                .filter_map(|(name, category)| {
                    event.attr(name).map(|value| CategoryKey::new(*category, value))
                }),
        );
        keys
    }
}

/// Counters kept per category key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub count: u64,
    pub total_duration: Duration,
}

impl Aggregate {
    /// Mean time per occurrence, `None` when nothing was credited.
    pub fn average_duration(&self) -> Option<Duration> {
        if self.count == 0 || self.total_duration.is_zero() {
            return None;
        }
        u32::try_from(self.count)
            .ok()
            .map(|count| self.total_duration / count)
    }
}

/// A run of activity with no gap longer than the idle threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub events: u64,
}

impl SessionSpan {
    pub fn duration(&self) -> Duration {
        (self.end - self.start).to_std().unwrap_or_default()
    }
}

/// Events at the latest timestamp folded so far.
#[derive(Debug, Clone)]
struct Frontier {
    timestamp: DateTime<Utc>,
    duration_keys: BTreeSet<CategoryKey>,
}

#[derive(Debug, Clone)]
pub struct Statistics {
    idle_threshold: Duration,
    total_events: u64,
    categories: BTreeMap<CategoryKey, Aggregate>,
    sessions: Vec<SessionSpan>,
    active_time: Duration,
    frontier: Option<Frontier>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::empty()
    }
}

impl Statistics {
    /// Zero-valued statistics with the default idle threshold.
    pub fn empty() -> Self {
        Self::with_idle_threshold(Duration::from_secs(DEFAULT_IDLE_THRESHOLD_SECS))
    }

    pub fn with_idle_threshold(idle_threshold: Duration) -> Self {
        Self {
            idle_threshold,
            total_events: 0,
            categories: BTreeMap::new(),
            sessions: Vec::new(),
            active_time: Duration::ZERO,
            frontier: None,
        }
    }

    /// Accumulation step: returns the statistics with `event` folded in.
    pub fn fold(mut self, event: &Event) -> Self {
        self.record(event);
        self
    }

    pub fn record(&mut self, event: &Event) {
        self.total_events += 1;

        let keys = CategoryKey::for_event(event);
        let duration_keys: BTreeSet<CategoryKey> = keys
            .iter()
            .filter(|key| key.category.tracks_duration())
            .cloned()
            .collect();
        for key in keys {
            self.categories.entry(key).or_default().count += 1;
        }

        let timestamp = event.timestamp();
        let Some(frontier) = self.frontier.as_mut() else {
            self.start_session(timestamp, duration_keys);
            return;
        };

        if timestamp <= frontier.timestamp {
            // Same instant, or an out-of-order record: counts only, no time.
            frontier.duration_keys.extend(duration_keys);
            if let Some(session) = self.sessions.last_mut() {
                session.events += 1;
            }
            return;
        }

        let gap = (timestamp - frontier.timestamp).to_std().unwrap_or_default();
        if gap > self.idle_threshold {
            self.start_session(timestamp, duration_keys);
            return;
        }

        for key in std::mem::take(&mut frontier.duration_keys) {
            self.categories.entry(key).or_default().total_duration += gap;
        }
        frontier.timestamp = timestamp;
        frontier.duration_keys = duration_keys;
        self.active_time += gap;
        if let Some(session) = self.sessions.last_mut() {
            session.end = timestamp;
            session.events += 1;
        }
    }

    fn start_session(&mut self, timestamp: DateTime<Utc>, duration_keys: BTreeSet<CategoryKey>) {
        self.frontier = Some(Frontier {
            timestamp,
            duration_keys,
        });
        self.sessions.push(SessionSpan {
            start: timestamp,
            end: timestamp,
            events: 1,
        });
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }

    pub fn aggregate(&self, key: &CategoryKey) -> Option<&Aggregate> {
        self.categories.get(key)
    }

    pub fn count(&self, key: &CategoryKey) -> u64 {
        self.aggregate(key).map(|aggregate| aggregate.count).unwrap_or(0)
    }

    pub fn count_of_kind(&self, kind: EventKind) -> u64 {
        self.count(&CategoryKey::kind(kind))
    }

    pub fn duration(&self, key: &CategoryKey) -> Duration {
        self.aggregate(key)
            .map(|aggregate| aggregate.total_duration)
            .unwrap_or_default()
    }

    pub fn categories(&self) -> impl Iterator<Item = (&CategoryKey, &Aggregate)> {
        self.categories.iter()
    }

    /// The `limit` most frequent keys of one category, ties broken by name.
    pub fn top(&self, category: Category, limit: usize) -> Vec<(&str, Aggregate)> {
        let mut entries: Vec<(&str, Aggregate)> = self
            .categories
            .iter()
            .filter(|(key, _)| key.category == category)
            .map(|(key, aggregate)| (key.name.as_str(), *aggregate))
            .collect();
        entries.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
        entries.truncate(limit);
        entries
    }

    /// The `limit` keys of one category with the most credited time.
    pub fn top_by_duration(&self, category: Category, limit: usize) -> Vec<(&str, Aggregate)> {
        let mut entries: Vec<(&str, Aggregate)> = self
            .categories
            .iter()
            .filter(|(key, aggregate)| key.category == category && !aggregate.total_duration.is_zero())
            .map(|(key, aggregate)| (key.name.as_str(), *aggregate))
            .collect();
        entries.sort_by(|a, b| {
            b.1.total_duration
                .cmp(&a.1.total_duration)
                .then_with(|| a.0.cmp(b.0))
        });
        entries.truncate(limit);
        entries
    }

    pub fn sessions(&self) -> &[SessionSpan] {
        &self.sessions
    }

    /// Sum of all gaps within sessions.
    pub fn active_time(&self) -> Duration {
        self.active_time
    }

    pub fn first_event(&self) -> Option<DateTime<Utc>> {
        self.sessions.first().map(|session| session.start)
    }

    pub fn last_event(&self) -> Option<DateTime<Utc>> {
        self.sessions.iter().map(|session| session.end).max()
    }

    /// Flat, serializable view for reports.
    pub fn report(&self) -> StatsReport {
        StatsReport {
            total_events: self.total_events,
            first_event: self.first_event(),
            last_event: self.last_event(),
            active_ms: duration_ms(self.active_time),
            idle_threshold_secs: self.idle_threshold.as_secs(),
            sessions: self.sessions.clone(),
            categories: self
                .categories
                .iter()
                .map(|(key, aggregate)| CategoryEntry {
                    category: key.category,
                    name: key.name.clone(),
                    count: aggregate.count,
                    total_duration_ms: duration_ms(aggregate.total_duration),
                })
                .collect(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub total_events: u64,
    pub first_event: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
    pub active_ms: u64,
    pub idle_threshold_secs: u64,
    pub sessions: Vec<SessionSpan>,
    pub categories: Vec<CategoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryEntry {
    pub category: Category,
    pub name: String,
    pub count: u64,
    pub total_duration_ms: u64,
}
