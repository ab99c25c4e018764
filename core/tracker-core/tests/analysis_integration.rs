//! End-to-end analysis over real log files.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tracker_core::{
    analyze_blocking, attr, AnalysisResult, Category, CategoryKey, Event, EventAnalyzer,
    EventKind, LogConfig, ReadScope, Task, ThreadRunner, TrackerLog,
};

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn scenario_config() -> LogConfig {
    LogConfig {
        file_stem: "log".to_string(),
        extension: String::new(),
        ..LogConfig::default()
    }
}

#[test]
fn test_build_key_save_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(TrackerLog::new(temp_dir.path(), scenario_config()));
    log.append(&Event::ide_action(ts(1), "build")).unwrap();
    log.append(&Event::key_press(ts(2), "a")).unwrap();
    log.append(&Event::ide_action(ts(3), "save")).unwrap();

    let analyzer = EventAnalyzer::new(Arc::clone(&log), ThreadRunner::default());
    match analyze_blocking(&analyzer) {
        Some(AnalysisResult::Ok { stats, errors }) => {
            assert_eq!(stats.count_of_kind(EventKind::IdeAction), 2);
            assert_eq!(stats.count_of_kind(EventKind::KeyPress), 1);
            assert!(errors.is_empty());
        }
        other => panic!("expected Ok, got {other:?}"),
    }

    let rolled = log.roll_log().unwrap();
    assert_eq!(rolled.file_name().unwrap(), "log-1");

    let fourth = Event::ide_state(ts(4));
    log.append(&fourth).unwrap();
    let current: Vec<Event> = log
        .read_all()
        .unwrap()
        .map(|line| tracker_core::decode(&line.unwrap()).unwrap())
        .collect();
    assert_eq!(current, vec![fourth]);
}

#[test]
fn test_partially_corrupt_log_reports_every_bad_line() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(TrackerLog::new(temp_dir.path(), LogConfig::default()));
    let valid: Vec<Event> = (1..=5)
        .map(|secs| Event::ide_action(ts(secs), "Build"))
        .collect();

    let mut content = String::new();
    for (i, event) in valid.iter().enumerate() {
        content.push_str(&tracker_core::encode(event));
        content.push('\n');
        if i % 2 == 0 {
            content.push_str("{\"ts\":\"garbage\",\"kind\":\"ide_state\"}\n");
        }
    }
    content.push_str("{\"ts\":\"1970-01-01T00:00:09Z\",\"ki");
    fs_err::write(log.current_log_file(), content).unwrap();

    let analyzer = EventAnalyzer::new(Arc::clone(&log), ThreadRunner::default());
    match analyze_blocking(&analyzer) {
        Some(AnalysisResult::Ok { stats, errors }) => {
            assert_eq!(stats.total_events(), 5);
            assert_eq!(stats.count(&CategoryKey::new(Category::Action, "Build")), 5);
            assert_eq!(errors.len(), 4);
        }
        other => panic!("expected Ok, got {other:?}"),
    }
}

#[test]
fn test_single_flight_across_threads() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(TrackerLog::new(temp_dir.path(), LogConfig::default()));
    log.append(&Event::ide_state(ts(1))).unwrap();

    // The first pass blocks until the test releases it.
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Arc::new(Mutex::new(release_rx));
    let runner = move |task: Task| {
        let release_rx = Arc::clone(&release_rx);
        std::thread::spawn(move || {
            let _ = release_rx.lock().unwrap().recv();
            task();
        });
    };
    let analyzer = EventAnalyzer::new(Arc::clone(&log), runner);

    let (done_tx, done_rx) = mpsc::channel();
    let first_tx = done_tx.clone();
    analyzer.analyze(move |result| first_tx.send(("first", result)).unwrap());
    analyzer.analyze(move |result| done_tx.send(("second", result)).unwrap());

    let (label, result) = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(label, "second");
    assert!(matches!(result, AnalysisResult::AlreadyRunning));

    release_tx.send(()).unwrap();
    let (label, result) = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(label, "first");
    assert!(matches!(result, AnalysisResult::Ok { .. }));

    // Idle again: a new request is accepted.
    let (again_tx, again_rx) = mpsc::channel();
    analyzer.analyze(move |result| again_tx.send(result).unwrap());
    release_tx.send(()).unwrap();
    assert!(matches!(
        again_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        AnalysisResult::Ok { .. }
    ));
}

#[test]
fn test_size_gate_never_submits_work() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(TrackerLog::new(
        temp_dir.path(),
        LogConfig {
            max_bytes_to_process: 1,
            ..LogConfig::default()
        },
    ));
    log.append(&Event::ide_state(ts(1))).unwrap();
    assert!(log.is_too_large_to_process());

    let submitted = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&submitted);
    let analyzer = EventAnalyzer::new(Arc::clone(&log), move |task: Task| {
        *counter.lock().unwrap() += 1;
        task();
    });

    let result = analyze_blocking(&analyzer);
    assert!(matches!(result, Some(AnalysisResult::DataTooLarge)));
    assert_eq!(*submitted.lock().unwrap(), 0);
    assert!(!analyzer.is_running());
}

#[test]
fn test_all_files_scope_spans_rolled_history() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(TrackerLog::new(
        temp_dir.path(),
        LogConfig {
            read_scope: ReadScope::AllFiles,
            ..LogConfig::default()
        },
    ));
    log.append(&Event::ide_state(ts(0)).with_attr(attr::FILE, "main.rs"))
        .unwrap();
    log.roll_log().unwrap();
    log.append(&Event::ide_state(ts(30)).with_attr(attr::FILE, "lib.rs"))
        .unwrap();
    log.append(&Event::ide_state(ts(40))).unwrap();

    let analyzer = EventAnalyzer::new(Arc::clone(&log), ThreadRunner::default())
        .with_idle_threshold(Duration::from_secs(60));
    match analyze_blocking(&analyzer) {
        Some(AnalysisResult::Ok { stats, errors }) => {
            assert!(errors.is_empty());
            assert_eq!(stats.total_events(), 3);
            assert_eq!(
                stats.duration(&CategoryKey::new(Category::File, "main.rs")),
                Duration::from_secs(30)
            );
            assert_eq!(
                stats.duration(&CategoryKey::new(Category::File, "lib.rs")),
                Duration::from_secs(10)
            );
            assert_eq!(stats.sessions().len(), 1);
        }
        other => panic!("expected Ok, got {other:?}"),
    }
}
