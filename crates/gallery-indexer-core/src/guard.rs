use crate::error::Error;
use crate::storage::models::IndexerState;
use crate::storage::Database;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Process-wide single-run flag backed by the `indexer_state` row.
///
/// Acquisition is one conditional update, so two callers racing for the
/// flag cannot both win.
pub struct IndexGuard {
    db: Arc<Database>,
}

impl IndexGuard {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Sets `is_indexing` and returns true only if it was clear.
    pub fn try_acquire(&self) -> Result<bool, Error> {
        let acquired = self.db.claim_indexing()?;
        if acquired {
            debug!("Indexing status updated to 'running'.");
        }
        Ok(acquired)
    }

    /// Clears `is_indexing` and stamps `last_indexed`.
    pub fn release(&self) -> Result<(), Error> {
        self.db.release_indexing(&Utc::now())?;
        debug!("Indexing status updated to 'idle'.");
        Ok(())
    }

    /// Clears a flag left behind by a crashed process. Returns whether it was set.
    pub fn force_reset(&self) -> Result<bool, Error> {
        let was_set = self.db.reset_indexing()?;
        if was_set {
            warn!("Indexing flag was still set at startup; reset");
        }
        Ok(was_set)
    }

    pub fn is_indexing(&self) -> Result<bool, Error> {
        Ok(self.state()?.is_indexing)
    }

    pub fn state(&self) -> Result<IndexerState, Error> {
        Ok(self.db.get_indexer_state()?)
    }

    /// Acquires the flag and returns a lease that releases it when dropped.
    pub fn lease(&self) -> Result<Option<IndexLease<'_>>, Error> {
        if self.try_acquire()? {
            Ok(Some(IndexLease {
                guard: self,
                released: false,
            }))
        } else {
            Ok(None)
        }
    }
}

/// Held for the duration of one run.
pub struct IndexLease<'a> {
    guard: &'a IndexGuard,
    released: bool,
}

impl IndexLease<'_> {
    pub fn release(mut self) -> Result<(), Error> {
        self.released = true;
        self.guard.release()
    }
}

impl Drop for IndexLease<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.guard.release() {
                error!("Error releasing indexing flag: {}", err);
            }
        }
    }
}
