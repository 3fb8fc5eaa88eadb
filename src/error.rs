use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Journal encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Report error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Archive tester '{program}' is not available: {reason}")]
    TesterUnavailable { program: String, reason: String },

    #[error("Invalid path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("{0}")]
    Other(String),
}
