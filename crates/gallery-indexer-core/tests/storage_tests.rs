use chrono::{Duration, Utc};
use gallery_indexer_core::storage::models::*;
use gallery_indexer_core::storage::Database;
use gallery_indexer_core::{IndexQuery, JobTracker};
use std::sync::Arc;

fn make_record(directory: &str, filename: &str, size: i64) -> FileRecord {
    FileRecord {
        filename: filename.to_string(),
        size,
        created: None,
        modified: Some(Utc::now()),
        accessed: Some(Utc::now()),
        directory: directory.to_string(),
        extension: format!(
            ".{}",
            filename.rsplit('.').next().unwrap_or_default().to_lowercase()
        ),
    }
}

#[test]
fn test_upsert_reports_insert_then_update() {
    let db = Database::open_in_memory().unwrap();
    let first_seen = Utc::now() - Duration::days(3);

    let outcome = db
        .upsert_file(&make_record("/a", "y.png", 100), &first_seen)
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Inserted);

    let outcome = db
        .upsert_file(&make_record("/a", "y.png", 200), &Utc::now())
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Updated);

    let stored = db.get_file("/a", "y.png").unwrap().unwrap();
    assert_eq!(stored.record.size, 200);
    assert_eq!(stored.times_seen, 2);
    assert_eq!(
        stored.indexed_at.timestamp_micros(),
        first_seen.timestamp_micros()
    );
    assert_eq!(db.count_files().unwrap(), 1);
}

#[test]
fn test_same_name_in_different_directories_are_distinct() {
    let db = Database::open_in_memory().unwrap();
    let now = Utc::now();
    assert_eq!(
        db.upsert_file(&make_record("/a", "x.jpg", 1), &now).unwrap(),
        WriteOutcome::Inserted
    );
    assert_eq!(
        db.upsert_file(&make_record("/b", "x.jpg", 1), &now).unwrap(),
        WriteOutcome::Inserted
    );
    assert_eq!(db.count_files().unwrap(), 2);
}

#[test]
fn test_count_files_under_respects_directory_boundaries() {
    let db = Database::open_in_memory().unwrap();
    let now = Utc::now();
    db.upsert_file(&make_record("/data/scan", "a.jpg", 1), &now).unwrap();
    db.upsert_file(&make_record("/data/scan/sub", "b.jpg", 1), &now).unwrap();
    db.upsert_file(&make_record("/data/scan2", "c.jpg", 1), &now).unwrap();
    db.upsert_file(&make_record("/data", "d.jpg", 1), &now).unwrap();

    assert_eq!(db.count_files_under("/data/scan").unwrap(), 2);
    assert_eq!(db.count_files_under("/data").unwrap(), 4);
}

#[test]
fn test_search_is_case_insensitive_sorted_and_paginated() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let now = Utc::now();
    for name in ["Beach.jpg", "beach_2.png", "forest.jpg", "BEACHES.gif", "city.png"] {
        db.upsert_file(&make_record("/photos", name, 10), &now).unwrap();
    }
    let query = IndexQuery::new(db.clone());

    let page = query
        .search_by_name("beach", Page::new(1, 2), SortOrder::Asc)
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.page, 1);
    assert_eq!(page.limit, 2);
    let names: Vec<_> = page.results.iter().map(|f| f.record.filename.as_str()).collect();
    assert_eq!(names, vec!["BEACHES.gif", "Beach.jpg"]);

    let page = query
        .search_by_name("BEACH", Page::new(2, 2), SortOrder::Asc)
        .unwrap();
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].record.filename, "beach_2.png");

    let page = query
        .search_by_name("beach", Page::new(1, 10), SortOrder::Desc)
        .unwrap();
    assert_eq!(page.results[0].record.filename, "beach_2.png");

    assert_eq!(query.total_files().unwrap(), 5);
}

#[test]
fn test_search_treats_wildcards_literally() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let now = Utc::now();
    db.upsert_file(&make_record("/p", "100%_done.png", 1), &now).unwrap();
    db.upsert_file(&make_record("/p", "1000_done.png", 1), &now).unwrap();
    let query = IndexQuery::new(db);

    let page = query
        .search_by_name("%_", Page::default(), SortOrder::Asc)
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.results[0].record.filename, "100%_done.png");
}

#[test]
fn test_empty_search_is_rejected() {
    let query = IndexQuery::new(Arc::new(Database::open_in_memory().unwrap()));
    assert!(query
        .search_by_name("   ", Page::default(), SortOrder::Asc)
        .is_err());
}

#[test]
fn test_job_lifecycle_and_history() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let jobs = JobTracker::new(db.clone());

    let first = jobs.open().unwrap();
    jobs.close(first, JobStatus::Completed, None, 10, 4).unwrap();
    let second = jobs.open().unwrap();
    jobs.close(second, JobStatus::Failed, Some("boom"), 0, 0).unwrap();
    let third = jobs.open().unwrap();

    let all = jobs.history(HistoryFilter::All, Page::new(1, 10)).unwrap();
    let ids: Vec<_> = all.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![third, second, first]);

    let failed = jobs.history(HistoryFilter::Failed, Page::new(1, 10)).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error.as_deref(), Some("boom"));
    assert!(failed[0].ended_at.is_some());

    let completed = jobs
        .history(HistoryFilter::Completed, Page::new(1, 10))
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].total_files, 10);
    assert_eq!(completed[0].new_files, 4);

    let running = jobs.history(HistoryFilter::Running, Page::new(1, 10)).unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].id, third);
    assert!(running[0].ended_at.is_none());

    let second_page = jobs.history(HistoryFilter::All, Page::new(2, 2)).unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, first);

    let via_query = IndexQuery::new(db)
        .job_history(HistoryFilter::All, Page::new(1, 1))
        .unwrap();
    assert_eq!(via_query[0].id, third);
}

#[test]
fn test_job_closes_exactly_once() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let jobs = JobTracker::new(db);

    let job_id = jobs.open().unwrap();
    assert!(jobs.close(job_id, JobStatus::Running, None, 0, 0).is_err());
    jobs.close(job_id, JobStatus::Completed, None, 1, 1).unwrap();
    assert!(jobs.close(job_id, JobStatus::Failed, Some("late"), 0, 0).is_err());

    let job = jobs.get(job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.error, None);
}

#[test]
fn test_purge_stale_running_fails_only_running_jobs() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let jobs = JobTracker::new(db);

    let done = jobs.open().unwrap();
    jobs.close(done, JobStatus::Completed, None, 3, 3).unwrap();
    let stale_a = jobs.open().unwrap();
    let stale_b = jobs.open().unwrap();

    assert_eq!(jobs.purge_stale_running().unwrap(), 2);
    assert_eq!(jobs.purge_stale_running().unwrap(), 0);

    for id in [stale_a, stale_b] {
        let job = jobs.get(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.is_some());
    }
    assert_eq!(
        jobs.get(done).unwrap().unwrap().status,
        JobStatus::Completed
    );
}
