//! # Shared
//! Logging and failure helpers shared by the backup agent's binaries and tests.
//!

#![warn(missing_docs)]

mod failure;
mod logger;

pub use failure::{Failure, log_and_panic};
pub use logger::{LOG_DIRECTORY, LoggerError, init_logger, init_logger_in};
