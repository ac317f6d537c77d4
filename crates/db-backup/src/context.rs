//! Context for the current backup cycle. Used for prefixing logs.
//!

use core::fmt;

/// Stages a cycle moves through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    #[allow(missing_docs)]
    Idle,
    #[allow(missing_docs)]
    Dumping,
    #[allow(missing_docs)]
    Compressing,
    #[allow(missing_docs)]
    Uploading,
    /// The archive was over the upload size limit.
    SkippedTooLarge,
    #[allow(missing_docs)]
    UploadDisabled,
    #[allow(missing_docs)]
    CleaningUp,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Dumping => "Dump",
            Self::Compressing => "Compress",
            Self::Uploading => "Upload",
            Self::SkippedTooLarge => "Upload Skipped",
            Self::UploadDisabled => "Upload Disabled",
            Self::CleaningUp => "Cleanup",
        };

        f.write_str(name)
    }
}

/// Holds the context for the current cycle.
#[derive(Clone, Debug, Default)]
pub struct Context {
    /// The database being backed up.
    pub database: String,

    /// The cycle's sequence number.
    pub sequence: Option<u64>,

    /// The current stage.
    pub stage: Stage,
}

impl Context {
    /// Create a context for a cycle.
    pub fn new(database: &str, sequence: u64) -> Self {
        Self {
            database: database.to_string(),
            sequence: Some(sequence),
            stage: Stage::Idle,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sequence {
            Some(sequence) => write!(f, "[{}/#{sequence}] ", self.database)?,
            None => write!(f, "[{}] ", self.database)?,
        }

        write!(f, "[{}] ", self.stage)
    }
}
