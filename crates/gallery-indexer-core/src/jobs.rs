use crate::error::Error;
use crate::storage::models::{HistoryFilter, IndexingJob, JobStatus, Page};
use crate::storage::Database;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Error text recorded on jobs found still running by the cleanup step.
pub const STALE_JOB_ERROR: &str = "interrupted before completion";

/// Owns the `indexing_job` lifecycle: one row opened and closed per scan.
pub struct JobTracker {
    db: Arc<Database>,
}

impl JobTracker {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn open(&self) -> Result<i64, Error> {
        let job_id = self.db.insert_job(&Utc::now())?;
        info!(job_id, "Indexing job started");
        Ok(job_id)
    }

    /// Records the terminal state of a job. A job can be closed once; a
    /// second close, or a close to `running`, is an error.
    pub fn close(
        &self,
        job_id: i64,
        status: JobStatus,
        error: Option<&str>,
        total_files: u64,
        new_files: u64,
    ) -> Result<(), Error> {
        if !status.is_terminal() {
            return Err(Error::Other(format!(
                "job {} cannot be closed with status {}",
                job_id, status
            )));
        }
        let changed = self.db.finish_job(
            job_id,
            status,
            &Utc::now(),
            error,
            total_files as i64,
            new_files as i64,
        )?;
        if changed == 0 {
            return Err(Error::Other(format!("job {} is not running", job_id)));
        }
        info!(job_id, %status, total_files, new_files, "Indexing job closed");
        Ok(())
    }

    pub fn get(&self, job_id: i64) -> Result<Option<IndexingJob>, Error> {
        Ok(self.db.get_job(job_id)?)
    }

    /// Most recent first.
    pub fn history(&self, filter: HistoryFilter, page: Page) -> Result<Vec<IndexingJob>, Error> {
        Ok(self
            .db
            .list_jobs(filter.status(), page.limit as i64, page.offset())?)
    }

    /// Fails every job still marked running. Used before a new run starts
    /// and by startup recovery.
    pub fn purge_stale_running(&self) -> Result<usize, Error> {
        let count = self.db.fail_running_jobs(&Utc::now(), STALE_JOB_ERROR)?;
        debug!("Old indexing jobs cleaned up ({} stale)", count);
        Ok(count)
    }
}
