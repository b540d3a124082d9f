//! Logging infrastructure for tealium-core
//!
//! The library only emits `tracing` events. Hosts that want them on disk call
//! [`init`]; logs are written to `~/.local/state/tealium/` following XDG
//! standards, one file per UTC day named `tealium.YYYY-MM-DD.log`.

use crate::config::{Config, LoggingConfig};
use crate::error::Error;
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_FILE_PREFIX: &str = "tealium";
const LOG_FILE_SUFFIX: &str = "log";

/// Initialize the logging system
///
/// Sets up tracing with:
/// - File output to XDG state directory
/// - Daily rotation, keeping `max_files` files
/// - Configurable log level via config or RUST_LOG env var
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = file_appender(&log_dir, config.max_files)?;

    // Non-blocking writer so dispatch never waits on log I/O
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Build the filter from config or env var
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

fn file_appender(dir: &Path, max_files: usize) -> crate::error::Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(max_files.max(1))
        .build(dir)
        .map_err(|e| Error::Config(format!("failed to create log file appender: {}", e)))
}

/// Initialize logging for tests (logs to stdout)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Returns the path of today's log file
///
/// Files rotate at midnight UTC, so the name changes daily.
pub fn log_file_path() -> PathBuf {
    log_file_path_in(&Config::state_dir(), Utc::now().date_naive())
}

fn log_file_path_in(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!(
        "{}.{}.{}",
        LOG_FILE_PREFIX,
        date.format("%Y-%m-%d"),
        LOG_FILE_SUFFIX
    ))
}
