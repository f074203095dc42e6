use crate::cancel::CancellationToken;
use crate::config::IndexerConfig;
use crate::error::Error;
use crate::guard::IndexGuard;
use crate::jobs::JobTracker;
use crate::progress::{ProgressReporter, SilentReporter};
use crate::scanner::{ExtensionSet, ScanTally, Scanner};
use crate::storage::models::JobStatus;
use crate::storage::Database;
use crate::throttle::{Sleeper, ThreadSleeper, Throttle};
use crate::writer::UpsertWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Summary of one guarded run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub job_id: i64,
    pub tally: ScanTally,
    /// Records under the start path once the run finished. 0 for failed runs.
    pub total_files: u64,
    pub error: Option<String>,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Another run held the guard; nothing was done.
    Skipped,
    Completed(RunReport),
    Failed(RunReport),
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Skipped => None,
            RunOutcome::Completed(report) | RunOutcome::Failed(report) => Some(report),
        }
    }
}

/// What the startup recovery step found and fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub flag_was_set: bool,
    pub stale_jobs: usize,
}

/// Sequences guard → cleanup → job open → scan → job close → release.
pub struct IndexEngine {
    root: PathBuf,
    pause_after: u64,
    pause: Duration,
    extensions: ExtensionSet,
    db: Arc<Database>,
    guard: IndexGuard,
    jobs: JobTracker,
    writer: UpsertWriter,
    sleeper: Arc<dyn Sleeper>,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl IndexEngine {
    pub fn new(config: &IndexerConfig, db: Arc<Database>) -> Self {
        // Trailing separators and `.` components would otherwise leak into
        // the directory prefix used to count records under the root.
        let root: PathBuf = Path::new(&config.start_path).components().collect();
        Self {
            root,
            pause_after: config.pause_after,
            pause: config.pause_duration(),
            extensions: ExtensionSet::new(&config.file_types),
            guard: IndexGuard::new(db.clone()),
            jobs: JobTracker::new(db.clone()),
            writer: UpsertWriter::new(db.clone()),
            db,
            sleeper: Arc::new(ThreadSleeper),
            reporter: Arc::new(SilentReporter),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.writer = UpsertWriter::new(self.db.clone()).with_retry_backoff(backoff);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn guard(&self) -> &IndexGuard {
        &self.guard
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Startup recovery. Must run before the first trigger of a process:
    /// a crash mid-scan leaves the flag set and a job marked running.
    pub fn recover(&self) -> Result<RecoveryReport, Error> {
        let flag_was_set = self.guard.force_reset()?;
        let stale_jobs = self.jobs.purge_stale_running()?;
        if flag_was_set || stale_jobs > 0 {
            info!(
                stale_jobs,
                flag_was_set, "Recovered stale indexing state from a previous process"
            );
        }
        Ok(RecoveryReport {
            flag_was_set,
            stale_jobs,
        })
    }

    /// One guarded run. Returns `Err` only when the job bookkeeping itself
    /// cannot be written; scan failures come back as [`RunOutcome::Failed`].
    pub fn run_once(&self) -> Result<RunOutcome, Error> {
        let Some(lease) = self.guard.lease()? else {
            debug!("Indexing already in progress. Skipping this run.");
            return Ok(RunOutcome::Skipped);
        };

        self.jobs.purge_stale_running()?;
        let job_id = self.jobs.open()?;
        let start = Instant::now();

        let scanner = Scanner::new(
            &self.extensions,
            &self.writer,
            Throttle::new(self.pause_after, self.pause),
            self.sleeper.as_ref(),
            self.reporter.as_ref(),
            &self.cancel,
        );

        let outcome = match scanner.run(&self.root) {
            Ok(tally) => {
                let total_files = self
                    .db
                    .count_files_under(&self.root.to_string_lossy())? as u64;
                self.jobs.close(
                    job_id,
                    JobStatus::Completed,
                    None,
                    total_files,
                    tally.inserted,
                )?;
                RunOutcome::Completed(RunReport {
                    job_id,
                    tally,
                    total_files,
                    error: None,
                    duration: start.elapsed(),
                })
            }
            Err(err) => {
                error!(job_id, "Error during indexing: {}", err);
                let message = err.to_string();
                self.reporter.on_scan_failed(&message);
                self.jobs
                    .close(job_id, JobStatus::Failed, Some(&message), 0, 0)?;
                RunOutcome::Failed(RunReport {
                    job_id,
                    tally: ScanTally::default(),
                    total_files: 0,
                    error: Some(message),
                    duration: start.elapsed(),
                })
            }
        };

        lease.release()?;
        Ok(outcome)
    }
}
