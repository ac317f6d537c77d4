use std::{
    fs::create_dir_all,
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{
    Level,
    subscriber::{SetGlobalDefaultError, set_global_default},
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{layer::SubscriberExt, registry};

/// The directory log files are written to.
pub const LOG_DIRECTORY: &str = "./logs";

/// Create and set the global loggers.
///
/// The returned guards flush the non-blocking writers when dropped, so they must be held for the
/// lifetime of the program.
pub fn init_logger() -> Result<Vec<WorkerGuard>, LoggerError> {
    init_logger_in(Path::new(LOG_DIRECTORY))
}

/// Create and set the global loggers, writing log files to `directory`.
pub fn init_logger_in(directory: &Path) -> Result<Vec<WorkerGuard>, LoggerError> {
    create_dir_all(directory)
        .map_err(|e| LoggerError::CreateDirectory(e, directory.to_path_buf()))?;

    let filter = tracing_subscriber::filter::Targets::new().with_default(Level::INFO);

    // File layer
    let (file_guard, file_layer) = {
        let appender = RollingFileAppender::builder()
            .filename_prefix("db-backup")
            .filename_suffix("log")
            .rotation(Rotation::DAILY)
            .max_log_files(90)
            .build(directory)?;

        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .with_thread_names(true);

        (guard, layer)
    };

    // Std layer
    let (std_guard, std_layer) = {
        let (writer, guard) = tracing_appender::non_blocking(io::stdout());

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(true)
            .with_target(false);

        (guard, layer)
    };

    // Create registry
    let registry = registry().with(file_layer).with(std_layer).with(filter);

    // Set global subscriber
    set_global_default(registry)?;

    Ok(vec![file_guard, std_guard])
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Failed to create rolling appender:\n{0}")]
    CreateRollingAppender(#[from] tracing_appender::rolling::InitError),

    #[error("Failed to create log directory {1:?}:\n{0}")]
    CreateDirectory(#[source] io::Error, PathBuf),

    #[error("Failed to set the global subscriber:\n{0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),
}
