use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Metadata for one indexed file, keyed by `(directory, filename)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub filename: String,
    pub size: i64,
    /// `None` on file systems that do not report a birth time.
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub directory: String,
    /// Canonical lower-case form with a leading dot, e.g. `.jpg`.
    pub extension: String,
}

/// A `file_index` row as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFile {
    pub id: i64,
    pub record: FileRecord,
    /// First time the file was seen. Never overwritten by later scans.
    pub indexed_at: DateTime<Utc>,
    pub times_seen: i64,
}

/// Result of an upsert, decided by the store itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// One scan's lifecycle record.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexingJob {
    pub id: i64,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub total_files: i64,
    pub new_files: i64,
}

/// Which jobs a history query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryFilter {
    Failed,
    Completed,
    Running,
    #[default]
    All,
}

impl HistoryFilter {
    pub fn status(&self) -> Option<JobStatus> {
        match self {
            HistoryFilter::Failed => Some(JobStatus::Failed),
            HistoryFilter::Completed => Some(JobStatus::Completed),
            HistoryFilter::Running => Some(JobStatus::Running),
            HistoryFilter::All => None,
        }
    }
}

impl FromStr for HistoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "failed" | "errors" => Ok(HistoryFilter::Failed),
            "completed" => Ok(HistoryFilter::Completed),
            "running" => Ok(HistoryFilter::Running),
            "all" => Ok(HistoryFilter::All),
            other => Err(format!("unknown history filter '{}'", other)),
        }
    }
}

/// The singleton row owned by the concurrency guard.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexerState {
    pub is_indexing: bool,
    pub last_indexed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Offset/limit pair derived from a 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

pub const MAX_PAGE_LIMIT: u32 = 1000;

impl Page {
    /// Pages below 1 are treated as 1; the limit is clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(1, 10)
    }
}
