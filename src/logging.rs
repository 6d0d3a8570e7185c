//! Logging infrastructure for adops
//!
//! This module sets up file-based logging to adops.log, by default in the
//! executable's directory, with an optional stderr layer for `--verbose`.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file name written in the log directory
pub const LOG_FILE_NAME: &str = "adops.log";

/// Get the directory containing the executable
fn get_executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Open adops.log in `log_dir`, creating the directory if needed
fn open_log_file(log_dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(log_dir)
}

/// Initialize logging to adops.log.
///
/// Returns a guard that must be kept alive for the duration of the program
/// to ensure all logs are flushed to disk. When the log file cannot be
/// opened (read-only install directory, say) logging goes to stderr only
/// and no guard is returned.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Option<WorkerGuard> {
    let log_dir = log_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(get_executable_dir);

    let (file_layer, guard) = match open_log_file(&log_dir) {
        Ok(file_appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Warning: cannot write {} in {}: {}; logging to stderr",
                LOG_FILE_NAME,
                log_dir.display(),
                e
            );
            (None, None)
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = (verbose || guard.is_none()).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    guard
}
