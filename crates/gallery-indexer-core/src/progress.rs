use std::path::Path;
use std::time::Duration;

/// Trait for reporting scan progress.
///
/// The CLI implements it with an indicatif spinner; tests use it to observe
/// pauses and skipped entries. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _root: &Path) {}
    fn on_file_indexed(&self, _processed: u64, _path: &Path) {}
    fn on_pause(&self, _processed: u64, _duration: Duration) {}
    fn on_entry_skipped(&self, _path: Option<&Path>, _reason: &str) {}
    fn on_scan_complete(&self, _processed: u64, _inserted: u64, _duration_secs: f64) {}
    /// Called instead of `on_scan_complete` when the run ends in failure.
    fn on_scan_failed(&self, _error: &str) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
