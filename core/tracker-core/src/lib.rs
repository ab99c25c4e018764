//! # tracker-core
//!
//! Durable activity log and statistics engine for the activity tracker.
//!
//! ## Design Principles
//!
//! - **Append-only**: producers only ever add lines; roll and clear are the
//!   sole destructive operations and never lose data on failure.
//! - **Tolerant reads**: one bad line is an [`AnalysisError`], not a failed pass.
//! - **Scheduler-agnostic**: analysis runs on whatever [`BackgroundRunner`] the
//!   caller injects; no async runtime dependency.
//! - **Single-flight**: at most one analysis pass per [`EventAnalyzer`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tracker_core::{load_config, EventAnalyzer, ThreadRunner, TrackerLog};
//!
//! let config = load_config(None)?;
//! let log = Arc::new(TrackerLog::from_config(&config)?);
//! log.append(&Event::ide_action(Utc::now(), "Build"))?;
//!
//! let analyzer = EventAnalyzer::new(Arc::clone(&log), ThreadRunner::default());
//! analyzer.analyze(|result| println!("{result:?}"));
//! ```

pub mod analyzer;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod log_store;
pub mod stats;

pub use analyzer::{
    analyze_blocking, AnalysisError, AnalysisResult, BackgroundRunner, EventAnalyzer, Task,
    ThreadRunner,
};
pub use codec::{decode, encode};
pub use config::*;
pub use error::{DecodeError, LogRotationError, LogWriteError, Result, TrackerError};
pub use event::{attr, Event, EventKind};
pub use log_store::{LogLines, TrackerLog};
pub use stats::*;
