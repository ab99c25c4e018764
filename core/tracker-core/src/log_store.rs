//! Append-only tracking log with roll and clear.
//!
//! # Layout
//!
//! ```text
//! <log_dir>/
//! ├── ide-events.jsonl      # current file, receives appends
//! ├── ide-events-1.jsonl    # rolled files, oldest first
//! └── ide-events-2.jsonl
//! ```
//!
//! Rolled files carry a sequence number one higher than the highest already in
//! the directory. With an empty extension the names are `ide-events` and
//! `ide-events-<n>`.
//!
//! # Concurrency
//!
//! A single mutex serializes `append`, `roll_log`, `clear_log` and the snapshot
//! step of `read_all`. The snapshot opens every file it will read and records
//! its length while holding the lock; reading then happens without the lock
//! through length-limited handles. Rolling renames the current file and
//! clearing swaps in a fresh empty file, so a handle opened by an earlier
//! snapshot keeps reading the content it saw.
//!
//! # Ordering
//!
//! Appends must not go back in time. The baseline is the last timestamp in the
//! current file, recovered from its tail on first use, so a record dated in the
//! future blocks every later real-time append, across restarts too, until the
//! log is cleared or the clock catches up. The first rejection of that kind is
//! logged at `warn`.

use crate::codec;
use crate::config::{LogConfig, ReadScope, TrackerConfig};
use crate::error::{LogRotationError, LogWriteError, Result, TrackerError};
use crate::event::Event;
use chrono::{DateTime, Utc};
use fs_err as fs;
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// How much of an existing file's tail is inspected when reopening it.
const TAIL_SCAN_BYTES: u64 = 64 * 1024;

#[derive(Default)]
struct WriterState {
    writer: Option<BufWriter<fs::File>>,
    last_timestamp: Option<DateTime<Utc>>,
    /// The file on disk may end in a partial line that must be terminated
    /// before the next record is written.
    needs_newline: bool,
    /// Tail of the current file has been inspected since it was last opened.
    tail_checked: bool,
    /// A future-dated baseline has already been reported.
    future_baseline_reported: bool,
}

impl WriterState {
    /// Forgets the ordering baseline of a current file that is now empty.
    fn reset_baseline(&mut self) {
        self.last_timestamp = None;
        self.needs_newline = false;
        self.tail_checked = true;
        self.future_baseline_reported = false;
    }
}

/// Durable holder of serialized events.
pub struct TrackerLog {
    dir: PathBuf,
    config: LogConfig,
    state: Mutex<WriterState>,
}

impl TrackerLog {
    /// Creates a log rooted at `dir`. Nothing touches the disk until the first
    /// append, roll or clear.
    pub fn new(dir: impl Into<PathBuf>, config: LogConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
            state: Mutex::new(WriterState::default()),
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        Ok(Self::new(config.log_dir()?, config.log.clone()))
    }

    pub fn log_dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Path of the file currently receiving appends.
    pub fn current_log_file(&self) -> PathBuf {
        self.dir.join(self.file_name(None))
    }

    /// Rolled files in sequence order.
    pub fn rolled_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .rolled_entries()
            .map_err(|source| TrackerError::Io {
                context: format!("listing {}", self.dir.display()),
                source,
            })?
            .into_iter()
            .map(|(_, path)| path)
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Append
    // ─────────────────────────────────────────────────────────────────────────────

    /// Appends one event as a line to the current file.
    pub fn append(&self, event: &Event) -> std::result::Result<(), LogWriteError> {
        let mut state = self.lock_state();
        let path = self.current_log_file();

        if !state.tail_checked {
            let tail = inspect_tail(&path);
            state.needs_newline = !tail.ends_with_newline;
            if tail.last_timestamp > state.last_timestamp {
                state.last_timestamp = tail.last_timestamp;
            }
            state.tail_checked = true;
        }

        if let Some(last) = state.last_timestamp {
            if event.timestamp() < last {
                if last > Utc::now() && !state.future_baseline_reported {
                    state.future_baseline_reported = true;
                    tracing::warn!(
                        path = %path.display(),
                        last = %last,
                        "Tracking log ends in the future; earlier events are rejected until it is cleared"
                    );
                }
                return Err(LogWriteError::OutOfOrder {
                    last,
                    attempted: event.timestamp(),
                });
            }
        }

        let mut line = String::new();
        if state.needs_newline {
            line.push('\n');
        }
        line.push_str(&codec::encode(event));
        line.push('\n');

        if let Err(source) = self.write_line(&mut state, &path, line.as_bytes()) {
            // Whatever reached the disk is re-inspected on the next append.
            state.writer = None;
            state.tail_checked = false;
            tracing::warn!(path = %path.display(), error = %source, "Failed to append tracking event");
            return Err(LogWriteError::Io { path, source });
        }

        state.needs_newline = false;
        state.last_timestamp = Some(event.timestamp());
        Ok(())
    }

    fn write_line(&self, state: &mut WriterState, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if state.writer.is_none() {
            fs::create_dir_all(&self.dir)?;
            let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            tracing::debug!(path = %path.display(), "Opened tracking log for append");
            state.writer = Some(BufWriter::new(file));
        }
        match state.writer.as_mut() {
            Some(writer) => {
                writer.write_all(bytes)?;
                writer.flush()
            }
            None => Err(io::Error::new(io::ErrorKind::Other, "log writer unavailable")),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Size Gate
    // ─────────────────────────────────────────────────────────────────────────────

    /// Total size of the files in the configured read scope, from metadata only.
    pub fn size_in_bytes(&self) -> u64 {
        self.files_in_scope()
            .iter()
            .filter_map(|path| std::fs::metadata(path).ok())
            .map(|metadata| metadata.len())
            .sum()
    }

    /// Whether analysing the log would exceed the configured byte ceiling.
    pub fn is_too_large_to_process(&self) -> bool {
        self.size_in_bytes() > self.config.max_bytes_to_process
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Roll / Clear
    // ─────────────────────────────────────────────────────────────────────────────

    /// Moves the current file under the next rolled name and starts an empty
    /// current file. Returns the rolled path.
    pub fn roll_log(&self) -> std::result::Result<PathBuf, LogRotationError> {
        let mut state = self.lock_state();
        let current = self.current_log_file();
        let prepare_err = |source: io::Error| LogRotationError::Prepare {
            path: current.clone(),
            source,
        };

        if let Some(mut writer) = state.writer.take() {
            writer.flush().map_err(prepare_err)?;
        }
        if !state.tail_checked {
            // Keep the ordering guarantee across the roll boundary.
            let tail = inspect_tail(&current);
            if tail.last_timestamp > state.last_timestamp {
                state.last_timestamp = tail.last_timestamp;
            }
        }
        fs::create_dir_all(&self.dir).map_err(prepare_err)?;
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current)
            .map_err(prepare_err)?;

        let next_sequence = |sequence: u64| {
            sequence.checked_add(1).ok_or_else(|| {
                prepare_err(io::Error::new(
                    io::ErrorKind::Other,
                    "rolled file sequence numbers exhausted",
                ))
            })
        };
        let mut sequence = match self.rolled_entries().map_err(prepare_err)?.last() {
            Some((last, _)) => next_sequence(*last)?,
            None => 1,
        };
        let mut rolled = self.dir.join(self.file_name(Some(sequence)));
        while rolled.exists() {
            sequence = next_sequence(sequence)?;
            rolled = self.dir.join(self.file_name(Some(sequence)));
        }

        fs::rename(&current, &rolled).map_err(|source| LogRotationError::Roll {
            from: current.clone(),
            to: rolled.clone(),
            source,
        })?;

        // The rolled file may end in a fragment; the fresh file does not.
        state.needs_newline = false;
        state.tail_checked = true;
        if let Err(err) = fs::File::create(&current) {
            // Append recreates the file on demand, so the roll itself stands.
            tracing::warn!(path = %current.display(), error = %err, "Failed to create fresh tracking log");
        }

        tracing::info!(from = %current.display(), to = %rolled.display(), "Rolled tracking log");
        Ok(rolled)
    }

    /// Empties the current file. Returns `false` when there was nothing to clear.
    pub fn clear_log(&self) -> std::result::Result<bool, LogRotationError> {
        let mut state = self.lock_state();
        let current = self.current_log_file();
        let clear_err = |source: io::Error| LogRotationError::Clear {
            path: current.clone(),
            source,
        };

        if let Some(mut writer) = state.writer.take() {
            writer.flush().map_err(clear_err)?;
        }

        let metadata = match std::fs::metadata(&current) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                state.reset_baseline();
                return Ok(false);
            }
            Err(err) => return Err(clear_err(err)),
        };
        let len = metadata.len();
        if len == 0 {
            state.reset_baseline();
            return Ok(false);
        }

        // Swap in an empty file so a failure leaves the old content untouched.
        let empty = NamedTempFile::new_in(&self.dir).map_err(clear_err)?;
        empty
            .as_file()
            .set_permissions(metadata.permissions())
            .map_err(clear_err)?;
        empty
            .persist(&current)
            .map_err(|err| clear_err(err.error))?;

        state.reset_baseline();

        tracing::info!(path = %current.display(), bytes = len, "Cleared tracking log");
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Read
    // ─────────────────────────────────────────────────────────────────────────────

    /// Snapshots the files in the read scope and returns their lines in
    /// append order.
    pub fn read_all(&self) -> Result<LogLines> {
        let mut state = self.lock_state();
        if let Some(writer) = state.writer.as_mut() {
            writer.flush().map_err(|source| TrackerError::Io {
                context: "flushing tracking log before read".to_string(),
                source,
            })?;
        }

        let mut sources = VecDeque::new();
        for path in self.files_in_scope() {
            let file = match fs::File::open(&path) {
                Ok(file) => file,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(TrackerError::Io {
                        context: format!("opening {}", path.display()),
                        source,
                    })
                }
            };
            let len = file
                .metadata()
                .map_err(|source| TrackerError::Io {
                    context: format!("reading metadata of {}", path.display()),
                    source,
                })?
                .len();
            sources.push_back(LogSource {
                path,
                reader: BufReader::new(file.take(len)),
            });
        }
        drop(state);

        Ok(LogLines {
            sources,
            position: None,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Naming
    // ─────────────────────────────────────────────────────────────────────────────

    fn file_name(&self, sequence: Option<u64>) -> String {
        let stem = match sequence {
            Some(sequence) => format!("{}-{}", self.config.file_stem, sequence),
            None => self.config.file_stem.clone(),
        };
        if self.config.extension.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, self.config.extension)
        }
    }

    /// Parses the sequence number out of a rolled file name.
    fn rolled_sequence(&self, file_name: &str) -> Option<u64> {
        let rest = file_name.strip_prefix(&self.config.file_stem)?;
        let rest = rest.strip_prefix('-')?;
        let digits = if self.config.extension.is_empty() {
            rest
        } else {
            rest.strip_suffix(&self.config.extension)?.strip_suffix('.')?
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    fn rolled_entries(&self) -> io::Result<Vec<(u64, PathBuf)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut rolled: Vec<(u64, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let sequence = self.rolled_sequence(name.to_str()?)?;
                Some((sequence, entry.path()))
            })
            .filter(|(_, path)| path.is_file())
            .collect();
        rolled.sort_by_key(|(sequence, _)| *sequence);
        Ok(rolled)
    }

    /// Files a read covers under the configured scope, oldest first.
    pub fn files_in_scope(&self) -> Vec<PathBuf> {
        let mut files = match self.config.read_scope {
            ReadScope::CurrentFile => Vec::new(),
            ReadScope::AllFiles => match self.rolled_entries() {
                Ok(entries) => entries.into_iter().map(|(_, path)| path).collect(),
                Err(err) => {
                    tracing::warn!(dir = %self.dir.display(), error = %err, "Failed to list rolled tracking logs");
                    Vec::new()
                }
            },
        };
        files.push(self.current_log_file());
        files
    }

    fn lock_state(&self) -> MutexGuard<'_, WriterState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tail Inspection
// ═══════════════════════════════════════════════════════════════════════════════

struct Tail {
    last_timestamp: Option<DateTime<Utc>>,
    ends_with_newline: bool,
}

/// Looks at the end of an existing file to recover the last logged timestamp
/// and whether a crash left an unterminated fragment.
fn inspect_tail(path: &Path) -> Tail {
    let empty = Tail {
        last_timestamp: None,
        ends_with_newline: true,
    };
    let Ok(mut file) = std::fs::File::open(path) else {
        return empty;
    };
    let Ok(len) = file.metadata().map(|metadata| metadata.len()) else {
        return empty;
    };
    if len == 0 {
        return empty;
    }

    let start = len.saturating_sub(TAIL_SCAN_BYTES);
    let mut buf = Vec::new();
    if file.seek(SeekFrom::Start(start)).is_err() || file.read_to_end(&mut buf).is_err() {
        return empty;
    }

    let ends_with_newline = buf.last() == Some(&b'\n');
    let mut segments: Vec<&[u8]> = buf.split(|byte| *byte == b'\n').collect();
    if start > 0 && !segments.is_empty() {
        // First segment is most likely the middle of a line.
        segments.remove(0);
    }
    let last_timestamp = segments
        .into_iter()
        .rev()
        .filter_map(|segment| std::str::from_utf8(segment).ok())
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| codec::decode(line).ok())
        .map(|event| event.timestamp());

    Tail {
        last_timestamp,
        ends_with_newline,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Line Reader
// ═══════════════════════════════════════════════════════════════════════════════

struct LogSource {
    path: PathBuf,
    reader: BufReader<io::Take<fs::File>>,
}

/// Lazy sequence of raw lines from a [`TrackerLog::read_all`] snapshot.
///
/// A line that is not valid UTF-8 is yielded as an `InvalidData` error and
/// reading continues; any other I/O error abandons the rest of that file.
pub struct LogLines {
    sources: VecDeque<LogSource>,
    position: Option<(PathBuf, usize)>,
}

impl LogLines {
    /// File and 1-based line number of the most recently yielded item.
    pub fn position(&self) -> Option<(&Path, usize)> {
        self.position
            .as_ref()
            .map(|(path, line)| (path.as_path(), *line))
    }
}

fn advance_position(position: &mut Option<(PathBuf, usize)>, path: &Path) {
    match position {
        Some((current, line)) if current.as_path() == path => *line += 1,
        _ => *position = Some((path.to_path_buf(), 1)),
    }
}

impl Iterator for LogLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let source = self.sources.front_mut()?;
            let mut buf = Vec::new();
            match source.reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    self.sources.pop_front();
                }
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                    }
                    advance_position(&mut self.position, &source.path);
                    return Some(String::from_utf8(buf).map_err(|err| {
                        io::Error::new(io::ErrorKind::InvalidData, err.utf8_error())
                    }));
                }
                Err(err) => {
                    advance_position(&mut self.position, &source.path);
                    self.sources.pop_front();
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn config(stem: &str, extension: &str) -> LogConfig {
        LogConfig {
            file_stem: stem.to_string(),
            extension: extension.to_string(),
            ..LogConfig::default()
        }
    }

    fn lines(log: &TrackerLog) -> Vec<String> {
        log.read_all()
            .expect("read")
            .collect::<io::Result<Vec<_>>>()
            .expect("lines")
    }

    #[test]
    fn append_creates_directory_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("logs");
        let log = TrackerLog::new(&dir, LogConfig::default());

        log.append(&Event::ide_action(ts(1), "Build")).unwrap();

        assert_eq!(log.current_log_file(), dir.join("ide-events.jsonl"));
        assert!(log.current_log_file().is_file());
        assert_eq!(lines(&log).len(), 1);
    }

    #[test]
    fn append_rejects_out_of_order_events() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(temp_dir.path(), LogConfig::default());

        log.append(&Event::key_press(ts(5), "a")).unwrap();
        log.append(&Event::key_press(ts(5), "b")).unwrap();
        let err = log.append(&Event::key_press(ts(4), "c")).unwrap_err();

        assert!(matches!(err, LogWriteError::OutOfOrder { .. }));
        assert_eq!(lines(&log).len(), 2);
    }

    #[test]
    fn reopened_log_remembers_last_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        TrackerLog::new(temp_dir.path(), LogConfig::default())
            .append(&Event::ide_state(ts(100)))
            .unwrap();

        let reopened = TrackerLog::new(temp_dir.path(), LogConfig::default());
        assert!(matches!(
            reopened.append(&Event::ide_state(ts(99))),
            Err(LogWriteError::OutOfOrder { .. })
        ));
        reopened.append(&Event::ide_state(ts(101))).unwrap();
    }

    #[test]
    fn append_terminates_crash_fragment_first() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(temp_dir.path(), LogConfig::default());
        let valid = codec::encode(&Event::ide_state(ts(1)));
        fs::write(
            log.current_log_file(),
            format!("{valid}\n{{\"ts\":\"1970-01-01T00:00:0"),
        )
        .unwrap();

        log.append(&Event::ide_state(ts(2))).unwrap();

        let lines = lines(&log);
        assert_eq!(lines.len(), 3);
        assert!(codec::decode(&lines[1]).is_err());
        assert_eq!(codec::decode(&lines[2]), Ok(Event::ide_state(ts(2))));
    }

    #[test]
    fn roll_uses_next_sequence_number() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(temp_dir.path(), config("log", ""));
        fs::write(temp_dir.path().join("log-7"), "").unwrap();
        fs::write(temp_dir.path().join("log-x"), "").unwrap();

        log.append(&Event::ide_state(ts(1))).unwrap();
        let rolled = log.roll_log().unwrap();

        assert_eq!(rolled, temp_dir.path().join("log-8"));
        assert_eq!(
            log.rolled_files().unwrap(),
            vec![temp_dir.path().join("log-7"), temp_dir.path().join("log-8")]
        );
    }

    #[test]
    fn roll_of_missing_file_yields_empty_rolled_file() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(temp_dir.path().join("logs"), LogConfig::default());

        let rolled = log.roll_log().unwrap();

        assert_eq!(rolled.file_name().unwrap(), "ide-events-1.jsonl");
        assert_eq!(fs::metadata(&rolled).unwrap().len(), 0);
        assert_eq!(fs::metadata(log.current_log_file()).unwrap().len(), 0);
    }

    #[test]
    fn rolled_sequence_ignores_unrelated_names() {
        let log = TrackerLog::new("/unused", config("ide-events", "jsonl"));
        assert_eq!(log.rolled_sequence("ide-events-12.jsonl"), Some(12));
        assert_eq!(log.rolled_sequence("ide-events.jsonl"), None);
        assert_eq!(log.rolled_sequence("ide-events-.jsonl"), None);
        assert_eq!(log.rolled_sequence("ide-events-3.csv"), None);
        assert_eq!(log.rolled_sequence("other-3.jsonl"), None);
        assert_eq!(log.rolled_sequence("ide-events-+3.jsonl"), None);
    }

    #[test]
    fn clear_of_missing_or_empty_file_returns_false() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(temp_dir.path(), LogConfig::default());

        assert!(!log.clear_log().unwrap());
        fs::write(log.current_log_file(), "").unwrap();
        assert!(!log.clear_log().unwrap());
    }

    #[test]
    fn clear_allows_earlier_timestamps_afterwards() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(temp_dir.path(), LogConfig::default());
        log.append(&Event::ide_state(ts(50))).unwrap();

        assert!(log.clear_log().unwrap());
        log.append(&Event::ide_state(ts(10))).unwrap();
        assert_eq!(lines(&log).len(), 1);
    }

    #[test]
    fn snapshot_survives_roll_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(temp_dir.path(), LogConfig::default());
        for secs in 1..=3 {
            log.append(&Event::ide_state(ts(secs))).unwrap();
        }

        let snapshot = log.read_all().unwrap();
        log.append(&Event::ide_state(ts(4))).unwrap();
        log.roll_log().unwrap();
        log.append(&Event::ide_state(ts(5))).unwrap();
        log.clear_log().unwrap();

        let read: Vec<String> = snapshot.collect::<io::Result<_>>().unwrap();
        assert_eq!(read.len(), 3);
    }

    #[test]
    fn all_files_scope_reads_rolled_then_current() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(
            temp_dir.path(),
            LogConfig {
                read_scope: ReadScope::AllFiles,
                ..LogConfig::default()
            },
        );

        log.append(&Event::ide_state(ts(1))).unwrap();
        log.roll_log().unwrap();
        log.append(&Event::ide_state(ts(2))).unwrap();
        log.roll_log().unwrap();
        log.append(&Event::ide_state(ts(3))).unwrap();

        assert_eq!(log.files_in_scope().len(), 3);
        let timestamps: Vec<_> = lines(&log)
            .iter()
            .map(|line| codec::decode(line).unwrap().timestamp())
            .collect();
        assert_eq!(timestamps, vec![ts(1), ts(2), ts(3)]);
    }

    #[test]
    fn position_tracks_file_and_line() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(temp_dir.path(), LogConfig::default());
        log.append(&Event::ide_state(ts(1))).unwrap();
        log.append(&Event::ide_state(ts(2))).unwrap();

        let mut read = log.read_all().unwrap();
        assert!(read.position().is_none());
        read.next();
        read.next();
        let (path, line) = read.position().unwrap();
        assert_eq!(path, log.current_log_file());
        assert_eq!(line, 2);
    }

    #[test]
    fn invalid_utf8_line_does_not_stop_reading() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(temp_dir.path(), LogConfig::default());
        let mut content = b"\xff\xfe\n".to_vec();
        content.extend_from_slice(codec::encode(&Event::ide_state(ts(1))).as_bytes());
        content.push(b'\n');
        fs::write(log.current_log_file(), content).unwrap();

        let items: Vec<_> = log.read_all().unwrap().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap_err().kind(), io::ErrorKind::InvalidData);
        assert!(items[1].is_ok());
    }

    #[test]
    fn size_gate_uses_configured_ceiling() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(
            temp_dir.path(),
            LogConfig {
                max_bytes_to_process: 100,
                ..LogConfig::default()
            },
        );
        assert!(!log.is_too_large_to_process());

        log.append(&Event::ide_action(ts(1), "Build")).unwrap();
        assert!(!log.is_too_large_to_process());
        log.append(&Event::ide_action(ts(2), "Build")).unwrap();
        assert!(log.size_in_bytes() > 100);
        assert!(log.is_too_large_to_process());
    }

    #[test]
    fn store_errors_when_log_dir_parent_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "keep me").unwrap();
        let log = TrackerLog::new(blocker.join("logs"), LogConfig::default());

        assert!(matches!(
            log.append(&Event::ide_state(ts(1))),
            Err(LogWriteError::Io { .. })
        ));
        assert!(matches!(log.roll_log(), Err(LogRotationError::Prepare { .. })));
        assert!(matches!(log.clear_log(), Err(LogRotationError::Clear { .. })));
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "keep me");
    }

    #[test]
    fn failed_roll_keeps_current_content() {
        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(temp_dir.path(), LogConfig::default());
        log.append(&Event::ide_state(ts(1))).unwrap();
        log.append(&Event::ide_state(ts(2))).unwrap();
        let last_rolled = temp_dir
            .path()
            .join(format!("ide-events-{}.jsonl", u64::MAX));
        fs::write(&last_rolled, "").unwrap();

        assert!(matches!(log.roll_log(), Err(LogRotationError::Prepare { .. })));

        assert_eq!(lines(&log).len(), 2);
        assert_eq!(log.rolled_files().unwrap(), vec![last_rolled]);
        log.append(&Event::ide_state(ts(3))).unwrap();
        assert_eq!(lines(&log).len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn clear_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let log = TrackerLog::new(temp_dir.path(), LogConfig::default());
        log.append(&Event::ide_state(ts(1))).unwrap();
        let path = log.current_log_file();
        fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        assert!(log.clear_log().unwrap());

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn future_dated_record_blocks_appends_until_clear() {
        let temp_dir = TempDir::new().unwrap();
        let future = Utc::now() + chrono::Duration::days(365);
        let log = TrackerLog::new(temp_dir.path(), LogConfig::default());
        log.append(&Event::ide_state(future)).unwrap();

        assert!(matches!(
            log.append(&Event::ide_state(Utc::now())),
            Err(LogWriteError::OutOfOrder { last, .. }) if last == future
        ));

        let reopened = TrackerLog::new(temp_dir.path(), LogConfig::default());
        assert!(matches!(
            reopened.append(&Event::ide_state(Utc::now())),
            Err(LogWriteError::OutOfOrder { .. })
        ));

        assert!(reopened.clear_log().unwrap());
        reopened.append(&Event::ide_state(Utc::now())).unwrap();
        assert_eq!(lines(&reopened).len(), 1);
    }
}
