//! Asynchronous, single-flight analysis of the tracking log.
//!
//! [`EventAnalyzer::analyze`] never blocks the caller. It either answers
//! immediately (`AlreadyRunning`, `DataTooLarge`) or hands the read/decode/fold
//! pass to a [`BackgroundRunner`] and reports through the callback from
//! whichever thread that runner uses.
//!
//! ```rust,ignore
//! let analyzer = EventAnalyzer::new(log, ThreadRunner::default());
//! analyzer.analyze(|result| match result {
//!     AnalysisResult::Ok { stats, errors } => show(stats, errors),
//!     AnalysisResult::AlreadyRunning => notify("Analysis is already running."),
//!     AnalysisResult::DataTooLarge => notify("Activity log is too large to process."),
//! });
//! ```

use crate::codec;
use crate::config::DEFAULT_IDLE_THRESHOLD_SECS;
use crate::error::DecodeError;
use crate::log_store::TrackerLog;
use crate::stats::Statistics;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Unit of work handed to a [`BackgroundRunner`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks off the caller's thread.
///
/// `submit` must return promptly and the task must eventually run exactly once.
pub trait BackgroundRunner: Send + Sync {
    fn submit(&self, task: Task);
}

impl<F> BackgroundRunner for F
where
    F: Fn(Task) + Send + Sync,
{
    fn submit(&self, task: Task) {
        self(task)
    }
}

/// Spawns one named OS thread per task.
#[derive(Debug, Clone)]
pub struct ThreadRunner {
    name: String,
}

impl Default for ThreadRunner {
    fn default() -> Self {
        Self {
            name: "activity-analysis".to_string(),
        }
    }
}

impl ThreadRunner {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl BackgroundRunner for ThreadRunner {
    fn submit(&self, task: Task) {
        // Builder::spawn hands the closure back only on success, so keep a
        // shared slot to run the task inline if the OS refuses a thread.
        let slot = Arc::new(std::sync::Mutex::new(Some(task)));
        let worker_slot = Arc::clone(&slot);
        let spawned = thread::Builder::new().name(self.name.clone()).spawn(move || {
            let task = worker_slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            if let Some(task) = task {
                task();
            }
        });

        if let Err(err) = spawned {
            tracing::error!(error = %err, "Failed to spawn analysis thread; running inline");
            let task = slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            if let Some(task) = task {
                task();
            }
        }
    }
}

/// A log line that could not be used, with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisError {
    pub message: String,
    pub cause: DecodeError,
}

impl AnalysisError {
    fn at(position: Option<(&std::path::Path, usize)>, cause: DecodeError) -> Self {
        let message = match position {
            Some((path, line)) => format!("{}:{}: {}", path.display(), line, cause),
            None => cause.to_string(),
        };
        Self { message, cause }
    }
}

/// Outcome of one [`EventAnalyzer::analyze`] call.
#[derive(Debug)]
pub enum AnalysisResult {
    Ok {
        stats: Statistics,
        errors: Vec<AnalysisError>,
    },
    AlreadyRunning,
    DataTooLarge,
}

/// Clears the running flag when the pass ends, however it ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct EventAnalyzer {
    log: Arc<TrackerLog>,
    runner: Arc<dyn BackgroundRunner>,
    running: Arc<AtomicBool>,
    idle_threshold: Duration,
}

impl EventAnalyzer {
    pub fn new(log: Arc<TrackerLog>, runner: impl BackgroundRunner + 'static) -> Self {
        Self {
            log,
            runner: Arc::new(runner),
            running: Arc::new(AtomicBool::new(false)),
            idle_threshold: Duration::from_secs(DEFAULT_IDLE_THRESHOLD_SECS),
        }
    }

    /// Sets the gap after which statistics start a new session.
    pub fn with_idle_threshold(mut self, idle_threshold: Duration) -> Self {
        self.idle_threshold = idle_threshold;
        self
    }

    pub fn log(&self) -> &Arc<TrackerLog> {
        &self.log
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts an analysis pass; `on_done` receives exactly one result.
    pub fn analyze<F>(&self, on_done: F)
    where
        F: FnOnce(AnalysisResult) + Send + 'static,
    {
        if self.is_running() {
            tracing::debug!("Analysis requested while a pass is in flight");
            on_done(AnalysisResult::AlreadyRunning);
            return;
        }
        if self.log.is_too_large_to_process() {
            tracing::info!(
                bytes = self.log.size_in_bytes(),
                limit = self.log.config().max_bytes_to_process,
                "Tracking log too large to analyze"
            );
            on_done(AnalysisResult::DataTooLarge);
            return;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            on_done(AnalysisResult::AlreadyRunning);
            return;
        }

        let guard = RunningGuard(Arc::clone(&self.running));
        let log = Arc::clone(&self.log);
        let idle_threshold = self.idle_threshold;
        self.runner.submit(Box::new(move || {
            let (stats, errors) = run_pass(&log, idle_threshold);
            drop(guard);
            on_done(AnalysisResult::Ok { stats, errors });
        }));
    }
}

/// Reads, decodes and folds the whole log snapshot.
fn run_pass(log: &TrackerLog, idle_threshold: Duration) -> (Statistics, Vec<AnalysisError>) {
    let started = Instant::now();
    let mut stats = Statistics::with_idle_threshold(idle_threshold);
    let mut errors = Vec::new();

    let mut lines = match log.read_all() {
        Ok(lines) => lines,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to open tracking log for analysis");
            errors.push(AnalysisError {
                message: err.to_string(),
                cause: DecodeError::Unreadable {
                    details: err.to_string(),
                },
            });
            return (stats, errors);
        }
    };

    while let Some(line) = lines.next() {
        let decoded = line.map_err(unreadable).and_then(|line| codec::decode(&line));
        match decoded {
            Ok(event) => stats.record(&event),
            Err(cause) => errors.push(AnalysisError::at(lines.position(), cause)),
        }
    }

    tracing::info!(
        events = stats.total_events(),
        errors = errors.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Analyzed tracking log"
    );
    (stats, errors)
}

fn unreadable(err: io::Error) -> DecodeError {
    DecodeError::Unreadable {
        details: err.to_string(),
    }
}

/// Waits on the calling thread for the result, for front ends without an
/// event loop of their own. `None` means the runner dropped the task.
pub fn analyze_blocking(analyzer: &EventAnalyzer) -> Option<AnalysisResult> {
    let (sender, receiver) = std::sync::mpsc::channel();
    analyzer.analyze(move |result| {
        let _ = sender.send(result);
    });
    receiver.recv().ok()
}
