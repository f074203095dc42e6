use super::models::*;
use super::sqlite::Database;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Result, Row};
use std::path::MAIN_SEPARATOR;
use tracing::debug;

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub fn to_db_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_time(idx: usize, value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_time(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>> {
    parse_db_time(idx, row.get(idx)?)
}

fn get_opt_time(row: &Row<'_>, idx: usize) -> Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|value| parse_db_time(idx, value))
        .transpose()
}

const FILE_COLUMNS: &str = "id, filename, size, created, modified, accessed, directory, \
                            extension, indexed_at, times_seen";

fn indexed_file_from_row(row: &Row<'_>) -> Result<IndexedFile> {
    Ok(IndexedFile {
        id: row.get(0)?,
        record: FileRecord {
            filename: row.get(1)?,
            size: row.get(2)?,
            created: get_opt_time(row, 3)?,
            modified: get_opt_time(row, 4)?,
            accessed: get_opt_time(row, 5)?,
            directory: row.get(6)?,
            extension: row.get(7)?,
        },
        indexed_at: get_time(row, 8)?,
        times_seen: row.get(9)?,
    })
}

const JOB_COLUMNS: &str = "id, status, started_at, ended_at, error, total_files, new_files";

fn job_from_row(row: &Row<'_>) -> Result<IndexingJob> {
    let status: String = row.get(1)?;
    let status = status.parse::<JobStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into())
    })?;
    Ok(IndexingJob {
        id: row.get(0)?,
        status,
        started_at: get_time(row, 2)?,
        ended_at: get_opt_time(row, 3)?,
        error: row.get(4)?,
        total_files: row.get(5)?,
        new_files: row.get(6)?,
    })
}

/// Prefix that every directory strictly below `root` starts with.
fn descendant_prefix(root: &str) -> String {
    if root.ends_with(MAIN_SEPARATOR) {
        root.to_string()
    } else {
        format!("{}{}", root, MAIN_SEPARATOR)
    }
}

impl Database {
    // ── File Index ───────────────────────────────────────────────

    /// Insert-or-update keyed by `(directory, filename)` in one statement.
    /// `indexed_at` is only written on insert; `times_seen` comes back as 1
    /// exactly when the row was created by this call.
    pub fn upsert_file(&self, record: &FileRecord, now: &DateTime<Utc>) -> Result<WriteOutcome> {
        let conn = self.connection();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO file_index \
             (filename, size, created, modified, accessed, directory, extension, indexed_at, times_seen) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1) \
             ON CONFLICT(directory, filename) DO UPDATE SET \
                 size = excluded.size, \
                 created = excluded.created, \
                 modified = excluded.modified, \
                 accessed = excluded.accessed, \
                 extension = excluded.extension, \
                 times_seen = file_index.times_seen + 1 \
             RETURNING times_seen",
        )?;
        let times_seen: i64 = stmt.query_row(
            params![
                record.filename,
                record.size,
                record.created.as_ref().map(to_db_time),
                record.modified.as_ref().map(to_db_time),
                record.accessed.as_ref().map(to_db_time),
                record.directory,
                record.extension,
                to_db_time(now),
            ],
            |row| row.get(0),
        )?;
        Ok(if times_seen == 1 {
            WriteOutcome::Inserted
        } else {
            WriteOutcome::Updated
        })
    }

    pub fn get_file(&self, directory: &str, filename: &str) -> Result<Option<IndexedFile>> {
        self.connection()
            .query_row(
                &format!(
                    "SELECT {} FROM file_index WHERE directory = ?1 AND filename = ?2",
                    FILE_COLUMNS
                ),
                params![directory, filename],
                indexed_file_from_row,
            )
            .optional()
    }

    pub fn count_files(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM file_index", [], |row| row.get(0))
    }

    /// Count of records whose directory is `root` or nested below it.
    pub fn count_files_under(&self, root: &str) -> Result<i64> {
        let prefix = descendant_prefix(root);
        self.connection().query_row(
            "SELECT COUNT(*) FROM file_index \
             WHERE directory = ?1 OR substr(directory, 1, length(?2)) = ?2",
            params![root, prefix],
            |row| row.get(0),
        )
    }

    /// Case-insensitive substring search on the file name.
    pub fn search_files_by_name(
        &self,
        query: &str,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<IndexedFile>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM file_index \
             WHERE instr(lower(filename), lower(?1)) > 0 \
             ORDER BY filename {}, id {} \
             LIMIT ?2 OFFSET ?3",
            FILE_COLUMNS,
            order.as_sql(),
            order.as_sql(),
        ))?;
        let files = stmt
            .query_map(params![query, limit, offset], indexed_file_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(files)
    }

    pub fn count_files_by_name(&self, query: &str) -> Result<i64> {
        self.connection().query_row(
            "SELECT COUNT(*) FROM file_index WHERE instr(lower(filename), lower(?1)) > 0",
            params![query],
            |row| row.get(0),
        )
    }

    // ── Indexing Jobs ────────────────────────────────────────────

    pub fn insert_job(&self, started_at: &DateTime<Utc>) -> Result<i64> {
        let conn = self.connection();
        conn.execute(
            "INSERT INTO indexing_job (status, started_at) VALUES ('running', ?1)",
            params![to_db_time(started_at)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Moves a running job to a terminal state. Returns the number of rows
    /// changed, which is 0 if the job was already closed or does not exist.
    pub fn finish_job(
        &self,
        job_id: i64,
        status: JobStatus,
        ended_at: &DateTime<Utc>,
        error: Option<&str>,
        total_files: i64,
        new_files: i64,
    ) -> Result<usize> {
        self.connection().execute(
            "UPDATE indexing_job SET status = ?1, ended_at = ?2, error = ?3, \
             total_files = ?4, new_files = ?5 \
             WHERE id = ?6 AND status = 'running'",
            params![
                status.as_str(),
                to_db_time(ended_at),
                error,
                total_files,
                new_files,
                job_id
            ],
        )
    }

    pub fn get_job(&self, job_id: i64) -> Result<Option<IndexingJob>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM indexing_job WHERE id = ?1", JOB_COLUMNS),
                params![job_id],
                job_from_row,
            )
            .optional()
    }

    /// Jobs newest first, optionally restricted to one status.
    pub fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<IndexingJob>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM indexing_job \
             WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY started_at DESC, id DESC \
             LIMIT ?2 OFFSET ?3",
            JOB_COLUMNS
        ))?;
        let jobs = stmt
            .query_map(
                params![status.map(|s| s.as_str()), limit, offset],
                job_from_row,
            )?
            .collect::<Result<Vec<_>>>()?;
        Ok(jobs)
    }

    /// Marks every job still flagged `running` as failed.
    pub fn fail_running_jobs(&self, ended_at: &DateTime<Utc>, error: &str) -> Result<usize> {
        let count = self.connection().execute(
            "UPDATE indexing_job SET status = 'failed', ended_at = ?1, error = ?2 \
             WHERE status = 'running'",
            params![to_db_time(ended_at), error],
        )?;
        if count > 0 {
            debug!("Marked {} stale running jobs as failed", count);
        }
        Ok(count)
    }

    // ── Indexer State ────────────────────────────────────────────

    /// Flips `is_indexing` from 0 to 1. Returns false if it was already set.
    pub fn claim_indexing(&self) -> Result<bool> {
        let changed = self.connection().execute(
            "UPDATE indexer_state SET is_indexing = 1 WHERE id = 1 AND is_indexing = 0",
            [],
        )?;
        Ok(changed == 1)
    }

    pub fn release_indexing(&self, now: &DateTime<Utc>) -> Result<()> {
        self.connection().execute(
            "UPDATE indexer_state SET is_indexing = 0, last_indexed = ?1 WHERE id = 1",
            params![to_db_time(now)],
        )?;
        Ok(())
    }

    /// Clears the flag without touching `last_indexed`.
    pub fn reset_indexing(&self) -> Result<bool> {
        let changed = self.connection().execute(
            "UPDATE indexer_state SET is_indexing = 0 WHERE id = 1 AND is_indexing = 1",
            [],
        )?;
        Ok(changed == 1)
    }

    pub fn get_indexer_state(&self) -> Result<IndexerState> {
        self.connection().query_row(
            "SELECT is_indexing, last_indexed FROM indexer_state WHERE id = 1",
            [],
            |row| {
                Ok(IndexerState {
                    is_indexing: row.get(0)?,
                    last_indexed: get_opt_time(row, 1)?,
                })
            },
        )
    }
}
