use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The scan root is missing or unreadable. Fatal for the whole run.
    #[error("Cannot scan start path {}: {source}", .path.display())]
    StartPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
