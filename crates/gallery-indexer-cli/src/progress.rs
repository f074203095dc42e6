use gallery_indexer_core::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Spinner for the duration of a scan; files are not known upfront.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    /// Stops the spinner so `serve` shows nothing between runs.
    fn clear(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, root: &Path) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(format!("Scanning {}", root.display()));
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn on_file_indexed(&self, processed: u64, path: &Path) {
        self.with_bar(|pb| pb.set_message(format!("{} files - {}", processed, path.display())));
    }

    fn on_pause(&self, processed: u64, duration: Duration) {
        self.with_bar(|pb| {
            pb.set_message(format!(
                "{} files - pausing for {}s",
                processed,
                duration.as_secs()
            ))
        });
    }

    fn on_scan_complete(&self, _processed: u64, _inserted: u64, _duration_secs: f64) {
        self.clear();
    }

    fn on_scan_failed(&self, _error: &str) {
        self.clear();
    }
}

impl Drop for CliReporter {
    fn drop(&mut self) {
        self.clear();
    }
}
