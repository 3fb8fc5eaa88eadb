use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_NAME: &str = "archive-bus.log";

#[derive(Debug, PartialEq, Eq)]
struct LogSettings {
    filter: String,
    dir: PathBuf,
}

impl LogSettings {
    /// `TRACING_LEVEL` (default `info`) and `LOG_DIR` (default `./logs`).
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            filter: non_empty("TRACING_LEVEL").unwrap_or_else(|| "info".to_string()),
            dir: non_empty("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs")),
        }
    }
}

/// Log to stdout and to a daily file under `LOG_DIR`. Keep the returned
/// guard alive until exit so buffered file output is flushed.
pub fn init_logger() -> WorkerGuard {
    let settings = LogSettings::from_lookup(|key| env::var(key).ok());
    let filter_layer = EnvFilter::new(&settings.filter);

    let file_appender = tracing_appender::rolling::daily(&settings.dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter_layer)
        .init();

    info!(
        "Logging at {} to stdout and {}",
        settings.filter,
        settings.dir.join(LOG_FILE_NAME).display()
    );

    guard
}
