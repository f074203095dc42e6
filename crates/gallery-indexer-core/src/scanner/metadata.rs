use super::extensions::normalize_extension;
use crate::storage::models::FileRecord;
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

fn to_utc(time: io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

/// Stats `path` (following symlinks) and builds its [`FileRecord`].
pub fn read_file_record(path: &Path) -> io::Result<FileRecord> {
    let metadata = fs::metadata(path)?;
    file_record_from_metadata(path, &metadata)
}

pub fn file_record_from_metadata(path: &Path, metadata: &fs::Metadata) -> io::Result<FileRecord> {
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", path.display()),
            )
        })?;

    let directory = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    let extension = path
        .extension()
        .and_then(|ext| normalize_extension(&ext.to_string_lossy()))
        .unwrap_or_default();

    Ok(FileRecord {
        filename,
        size: metadata.len() as i64,
        created: to_utc(metadata.created()),
        modified: to_utc(metadata.modified()),
        accessed: to_utc(metadata.accessed()),
        directory,
        extension,
    })
}
