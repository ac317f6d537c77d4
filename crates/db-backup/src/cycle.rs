//! The files and timestamps of a single backup cycle.
//!

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::archive::archive_path_for;

/// The extension given to dumps.
pub const DUMP_EXTENSION: &str = "sql";

/// A single dump, compress, upload and cleanup run. Lives only as long as the cycle.
#[derive(Debug, Clone)]
pub struct BackupCycle {
    /// Increments by one for every cycle the runner starts.
    pub sequence: u64,

    /// The database being backed up.
    pub database: String,

    /// Where the dump is written.
    pub dump_path: PathBuf,

    /// Where the archive is written.
    pub archive_path: PathBuf,

    /// When the cycle started.
    pub started_at: DateTime<Local>,
}

impl BackupCycle {
    /// Plan a cycle, naming the files `{database}-{sequence}-{unix millis}`.
    pub fn new(
        backup_directory: &Path,
        database: &str,
        sequence: u64,
        started_at: DateTime<Local>,
    ) -> Self {
        let file_name = format!(
            "{database}-{sequence}-{}.{DUMP_EXTENSION}",
            started_at.timestamp_millis()
        );
        let dump_path = backup_directory.join(file_name);
        let archive_path = archive_path_for(&dump_path);

        Self {
            sequence,
            database: database.to_string(),
            dump_path,
            archive_path,
            started_at,
        }
    }

    /// The archive's file name.
    pub fn archive_file_name(&self) -> String {
        self.archive_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
