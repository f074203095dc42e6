use crate::error::Error;
use crate::storage::models::{
    HistoryFilter, IndexedFile, IndexerState, IndexingJob, Page, SortOrder,
};
use crate::storage::Database;
use std::sync::Arc;

/// One page of a file-name search.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub results: Vec<IndexedFile>,
    /// Matches across all pages.
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Read-only operations offered to the query layer.
pub struct IndexQuery {
    db: Arc<Database>,
}

impl IndexQuery {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn total_files(&self) -> Result<u64, Error> {
        Ok(self.db.count_files()? as u64)
    }

    pub fn search_by_name(
        &self,
        query: &str,
        page: Page,
        order: SortOrder,
    ) -> Result<SearchPage, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("search query is required".into()));
        }
        let results =
            self.db
                .search_files_by_name(query, order, page.limit as i64, page.offset())?;
        let total = self.db.count_files_by_name(query)? as u64;
        Ok(SearchPage {
            results,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    pub fn job_history(&self, filter: HistoryFilter, page: Page) -> Result<Vec<IndexingJob>, Error> {
        Ok(self
            .db
            .list_jobs(filter.status(), page.limit as i64, page.offset())?)
    }

    pub fn is_indexing(&self) -> Result<bool, Error> {
        Ok(self.indexer_state()?.is_indexing)
    }

    pub fn indexer_state(&self) -> Result<IndexerState, Error> {
        Ok(self.db.get_indexer_state()?)
    }
}
