//! # db-backup
//! Dumps a database on a timer, zips the dump, uploads the archive to a chat webhook and cleans up.
//!

pub mod archive;
pub mod cleanup;
pub mod config;
pub mod context;
pub mod cycle;
pub mod dump;
pub mod endpoint;
pub mod runner;
pub mod scheduler;

pub use config::Config;
pub use runner::{BackupRunner, CycleError, CycleOutcome, TickOutcome, UploadReport};
pub use scheduler::Scheduler;
