//! Endpoints to upload archives to.
//!

use std::{io, path::PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

mod webhook;

pub use webhook::{Embed, EmbedAuthor, EmbedField, EmbedFooter, Webhook, WebhookMessage};

/// An archive ready to be uploaded.
#[derive(Debug, Clone)]
pub struct Upload {
    /// The database the archive is a backup of.
    pub database: String,

    /// The path to the archive.
    pub archive_path: PathBuf,

    /// The archive's file name.
    pub file_name: String,

    /// The archive's size in bytes.
    pub size_bytes: u64,

    /// When the backup was made.
    pub created_at: DateTime<Local>,
}

/// An endpoint to upload archives to.
pub trait UploadEndpoint: Send + Sync {
    /// Upload an archive to the endpoint.
    fn upload(&self, upload: &Upload) -> Result<(), UploadError>;
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to {1}: {0}")]
    Request(#[source] reqwest::Error, &'static str),

    #[error("Endpoint rejected {action} with {status}: {body}")]
    Rejected {
        action: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to {1}: {0}")]
    Io(#[source] io::Error, &'static str),
}
