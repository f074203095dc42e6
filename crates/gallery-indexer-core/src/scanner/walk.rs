use super::extensions::ExtensionSet;
use super::metadata::read_file_record;
use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::storage::models::WriteOutcome;
use crate::throttle::{Sleeper, Throttle, ThrottleDecision};
use crate::writer::UpsertWriter;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Per-run counters returned by [`Scanner::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanTally {
    /// Qualifying files written to the store.
    pub processed: u64,
    pub inserted: u64,
    pub updated: u64,
    /// Entries that could not be listed or stat'ed.
    pub skipped: u64,
    /// Qualifying files whose write failed even after a retry.
    pub failed_writes: u64,
}

/// Depth-first, sequential traversal of one start path.
pub struct Scanner<'a> {
    extensions: &'a ExtensionSet,
    writer: &'a UpsertWriter,
    throttle: Throttle,
    sleeper: &'a dyn Sleeper,
    reporter: &'a dyn ProgressReporter,
    cancel: &'a CancellationToken,
}

impl<'a> Scanner<'a> {
    pub fn new(
        extensions: &'a ExtensionSet,
        writer: &'a UpsertWriter,
        throttle: Throttle,
        sleeper: &'a dyn Sleeper,
        reporter: &'a dyn ProgressReporter,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            extensions,
            writer,
            throttle,
            sleeper,
            reporter,
            cancel,
        }
    }

    /// Walks `root`, upserting every file with an allowed extension.
    ///
    /// A missing or unreadable `root` is fatal. Anything that goes wrong
    /// below it is logged, counted in the tally and skipped.
    pub fn run(mut self, root: &Path) -> Result<ScanTally, Error> {
        check_start_path(root)?;
        let real_root = fs::canonicalize(root).map_err(|source| Error::StartPath {
            path: root.to_path_buf(),
            source,
        })?;

        let start = Instant::now();
        let mut tally = ScanTally::default();
        self.reporter.on_scan_start(root);
        info!("Scanning {}", root.display());

        // Links back into the start path are not followed, so every file
        // below it is keyed by its real location. Directories outside it,
        // reached through a link, are walked once each.
        let mut outside_visited: HashSet<PathBuf> = HashSet::new();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| should_descend(entry, &real_root, &mut outside_visited));

        for entry in walker {
            if self.cancel.is_cancelled() {
                info!("Scan of {} cancelled", root.display());
                return Err(Error::Cancelled);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if err.depth() == 0 {
                        let message = err.to_string();
                        let source = err
                            .into_io_error()
                            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message));
                        return Err(Error::StartPath {
                            path: root.to_path_buf(),
                            source,
                        });
                    }
                    warn!("Skipping unreadable entry: {}", err);
                    self.reporter.on_entry_skipped(err.path(), &err.to_string());
                    tally.skipped += 1;
                    continue;
                }
            };

            let path = entry.path();
            if entry.file_type().is_dir() {
                debug!("Scanning directory: {}", path.display());
                continue;
            }
            if !entry.file_type().is_file() || self.extensions.match_path(path).is_none() {
                continue;
            }

            let record = match read_file_record(path) {
                Ok(record) => record,
                Err(err) => {
                    warn!("Error reading metadata for {}: {}", path.display(), err);
                    self.reporter.on_entry_skipped(Some(path), &err.to_string());
                    tally.skipped += 1;
                    continue;
                }
            };

            match self.writer.write(&record) {
                Ok(WriteOutcome::Inserted) => tally.inserted += 1,
                Ok(WriteOutcome::Updated) => tally.updated += 1,
                Err(err) => {
                    error!("Error writing {} to the index: {}", path.display(), err);
                    tally.failed_writes += 1;
                    continue;
                }
            }
            tally.processed += 1;
            self.reporter.on_file_indexed(tally.processed, path);

            if let ThrottleDecision::Pause(duration) = self.throttle.record_file() {
                self.pause(duration, tally.processed)?;
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        self.reporter
            .on_scan_complete(tally.processed, tally.inserted, elapsed);
        info!(
            processed = tally.processed,
            inserted = tally.inserted,
            updated = tally.updated,
            skipped = tally.skipped,
            failed_writes = tally.failed_writes,
            "Scan of {} finished in {:.2}s",
            root.display(),
            elapsed
        );
        Ok(tally)
    }

    fn pause(&self, duration: Duration, processed: u64) -> Result<(), Error> {
        info!(
            "Pausing for {:?} after scanning {} files...",
            duration, processed
        );
        self.reporter.on_pause(processed, duration);
        if !self.sleeper.sleep(duration, self.cancel) {
            info!("Pause interrupted by cancellation");
            return Err(Error::Cancelled);
        }
        debug!("Resuming scan...");
        Ok(())
    }
}

/// Decides whether a directory entry is walked into.
///
/// A linked directory whose target lies under the start path is pruned,
/// since the target is walked under its own name. A real directory under
/// the start path is never pruned.
fn should_descend(
    entry: &DirEntry,
    real_root: &Path,
    outside_visited: &mut HashSet<PathBuf>,
) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    let real = match fs::canonicalize(entry.path()) {
        Ok(real) => real,
        Err(_) => return true,
    };
    if real.starts_with(real_root) {
        if entry.path_is_symlink() {
            debug!(
                "{} links to {}, already under the start path, skipping",
                entry.path().display(),
                real.display()
            );
            return false;
        }
        return true;
    }
    let first_visit = outside_visited.insert(real);
    if !first_visit {
        debug!("Already visited {}, skipping", entry.path().display());
    }
    first_visit
}

/// The start path must exist, be a directory and be listable.
fn check_start_path(root: &Path) -> Result<(), Error> {
    let fatal = |source: io::Error| Error::StartPath {
        path: root.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(root).map_err(fatal)?;
    if !metadata.is_dir() {
        return Err(fatal(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }
    fs::read_dir(root).map_err(fatal)?;
    Ok(())
}
