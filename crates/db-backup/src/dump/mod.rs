//! Dump a database to a file.
//!

use std::{io, path::Path, process::ExitStatus};

use thiserror::Error;

mod mysql;

pub use mysql::{DumpOptions, MysqlDump};

/// Something that can write a dump of a database to a file.
pub trait Dumper: Send + Sync {
    /// Write a dump to `destination`, replacing anything already there.
    fn dump(&self, destination: &Path) -> Result<(), DumpError>;
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("Failed to run '{1}':\n{0}")]
    RunCommand(#[source] io::Error, String),

    #[error("'{program}' exited with {status}:\n{stderr}")]
    CommandErrored {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// For dumpers that write the destination themselves rather than through a command.
    #[error("Failed to {1}: {0}")]
    Io(#[source] io::Error, &'static str),
}
