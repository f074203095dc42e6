use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/gallery-indexer.log";

/// Splits a log file path into the directory the appender writes to and the
/// file name inside it.
fn log_location(path: &str) -> (PathBuf, PathBuf) {
    let path = Path::new(path);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("gallery-indexer.log"));
    (dir, file)
}

/// Logs to stdout and to a non-blocking file writer. The returned guard
/// flushes the file on drop, so `main` holds it for the process lifetime.
pub fn init_logger() -> impl Drop {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let log_path = env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let (log_dir, log_file) = log_location(&log_path);
    let dir_error = fs::create_dir_all(&log_dir).err();

    let file_appender = tracing_appender::rolling::never(&log_dir, &log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter_layer)
        .init();

    if let Some(err) = dir_error {
        warn!("Could not create log directory {}: {}", log_dir.display(), err);
    }
    info!(
        "Logging to stdout and {}",
        log_dir.join(&log_file).display()
    );

    guard
}
