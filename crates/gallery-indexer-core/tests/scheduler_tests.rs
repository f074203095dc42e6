use chrono::Utc;
use gallery_indexer_core::cancel::CancellationToken;
use gallery_indexer_core::storage::models::{HistoryFilter, JobStatus, Page};
use gallery_indexer_core::storage::Database;
use gallery_indexer_core::{
    CronTrigger, IndexEngine, IndexerConfig, ManualTrigger, ProgressReporter, Scheduler,
    TriggerHandle,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn engine_for(root: &std::path::Path, db: &Arc<Database>) -> IndexEngine {
    let config = IndexerConfig {
        start_path: root.to_string_lossy().into_owned(),
        file_types: vec!["jpg".to_string()],
        pause_time_seconds: 0,
        ..IndexerConfig::default()
    };
    IndexEngine::new(&config, db.clone())
}

#[test]
fn test_startup_and_manual_triggers_each_run_once() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("a.jpg"), "a").unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    let engine = Arc::new(engine_for(tmp.path(), &db));

    let (trigger, handle) = ManualTrigger::new();
    let scheduler = Scheduler::new(engine.clone(), Box::new(trigger));

    assert!(handle.fire());
    assert!(handle.fire());
    drop(handle);

    let summary = scheduler.spawn().unwrap().join().unwrap().unwrap();
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);

    let jobs = engine
        .jobs()
        .history(HistoryFilter::Completed, Page::new(1, 10))
        .unwrap();
    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[0].new_files, 0);
    assert_eq!(jobs[2].new_files, 1);
    assert!(!engine.guard().is_indexing().unwrap());
}

/// Fires one manual trigger from inside a run, then lets go of the handle.
struct FireWhileIndexing {
    handle: Mutex<Option<TriggerHandle>>,
}

impl ProgressReporter for FireWhileIndexing {
    fn on_file_indexed(&self, _processed: u64, _path: &Path) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            assert!(handle.fire());
        }
    }
}

#[test]
fn test_trigger_fired_during_run_is_skipped_not_queued() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("a.jpg"), "a").unwrap();
    fs::write(tmp.path().join("b.jpg"), "b").unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());

    let (trigger, handle) = ManualTrigger::new();
    let reporter = Arc::new(FireWhileIndexing {
        handle: Mutex::new(Some(handle.clone())),
    });
    let engine = Arc::new(engine_for(tmp.path(), &db).with_reporter(reporter));

    // Fired while idle: this one starts a run.
    assert!(handle.fire());
    drop(handle);

    let summary = Scheduler::new(engine.clone(), Box::new(trigger))
        .without_startup_run()
        .spawn()
        .unwrap()
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(db.list_jobs(None, 10, 0).unwrap().len(), 1);
    assert!(!engine.guard().is_indexing().unwrap());
}

#[test]
fn test_scheduler_recovers_before_first_run() {
    let tmp = tempdir().unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    assert!(db.claim_indexing().unwrap());
    let crashed = db.insert_job(&Utc::now()).unwrap();

    let engine = Arc::new(engine_for(tmp.path(), &db));
    let (trigger, handle) = ManualTrigger::new();
    drop(handle);

    let summary = Scheduler::new(engine.clone(), Box::new(trigger))
        .run()
        .unwrap();
    // Without recovery the leftover flag would turn the startup run into a skip.
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(
        engine.jobs().get(crashed).unwrap().unwrap().status,
        JobStatus::Failed
    );
}

#[test]
fn test_without_startup_run_waits_for_trigger() {
    let tmp = tempdir().unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    let engine = Arc::new(engine_for(tmp.path(), &db));
    let (trigger, handle) = ManualTrigger::new();
    drop(handle);

    let summary = Scheduler::new(engine, Box::new(trigger))
        .without_startup_run()
        .run()
        .unwrap();
    assert_eq!(summary.completed, 0);
    assert!(db.list_jobs(None, 10, 0).unwrap().is_empty());
}

#[test]
fn test_cancellation_stops_cron_scheduler() {
    let tmp = tempdir().unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    let cancel = CancellationToken::new();
    let engine = Arc::new(engine_for(tmp.path(), &db).with_cancellation(cancel.clone()));

    // Once a year: the loop only ends through cancellation.
    let trigger = CronTrigger::new("0 0 1 1 *").unwrap();
    let handle = Scheduler::new(engine.clone(), Box::new(trigger))
        .spawn()
        .unwrap();

    thread::sleep(Duration::from_millis(200));
    cancel.cancel();

    let summary = handle.join().unwrap().unwrap();
    assert_eq!(summary.completed + summary.failed, 1);
    assert!(!engine.guard().is_indexing().unwrap());
}
