use crate::error::Error;
use crate::storage::models::{FileRecord, WriteOutcome};
use crate::storage::Database;
use chrono::Utc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{trace, warn};

pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Persists [`FileRecord`]s keyed by `(directory, filename)`.
///
/// Each write is a single insert-or-update statement; the store's unique
/// constraint decides between insert and update. A failed write is retried
/// once after `retry_backoff` before the error is handed back.
pub struct UpsertWriter {
    db: Arc<Database>,
    retry_backoff: Duration,
}

impl UpsertWriter {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn write(&self, record: &FileRecord) -> Result<WriteOutcome, Error> {
        match self.db.upsert_file(record, &Utc::now()) {
            Ok(outcome) => {
                trace!(
                    directory = %record.directory,
                    filename = %record.filename,
                    ?outcome,
                    "Upserted file"
                );
                Ok(outcome)
            }
            Err(err) => {
                warn!(
                    directory = %record.directory,
                    filename = %record.filename,
                    "Write failed, retrying in {:?}: {}",
                    self.retry_backoff,
                    err
                );
                thread::sleep(self.retry_backoff);
                Ok(self.db.upsert_file(record, &Utc::now())?)
            }
        }
    }
}
