use core::time::Duration;
use std::fs;

use chrono::Utc;
use reqwest::blocking::{
    Client, Response,
    multipart::{Form, Part},
};
use serde::Serialize;
use tracing::debug;

use crate::{archive::human_bytes, config::WebhookConfig};

use super::{Upload, UploadEndpoint, UploadError};

/// Chat webhook message body.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookMessage {
    /// The embeds to post.
    pub embeds: Vec<Embed>,
}

/// A rich embed.
#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[allow(missing_docs)]
    pub author: EmbedAuthor,
    /// RGB colour.
    pub color: u32,
    #[allow(missing_docs)]
    pub fields: Vec<EmbedField>,
    #[allow(missing_docs)]
    pub footer: EmbedFooter,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn new(name: &str, value: String) -> Self {
        Self {
            name: name.to_string(),
            value,
            inline: false,
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Uploads archives to a chat webhook, an embed describing the backup followed by the file.
#[derive(Debug, Clone)]
pub struct Webhook {
    client: Client,
    config: WebhookConfig,
}

impl Webhook {
    /// Create a webhook endpoint from config.
    pub fn new(config: WebhookConfig) -> Result<Self, UploadError> {
        let client = Client::builder()
            .user_agent(concat!("db-backup/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(5 * 60))
            .build()
            .map_err(UploadError::Client)?;

        Ok(Self { client, config })
    }

    /// The message describing an upload.
    pub fn message(&self, upload: &Upload) -> WebhookMessage {
        let embed = Embed {
            author: EmbedAuthor {
                name: self.config.author.clone(),
            },
            color: self.config.color.0,
            fields: vec![
                EmbedField::new("Database", upload.database.clone()),
                EmbedField::new("Backup File", upload.file_name.clone()),
                EmbedField::new("Size", human_bytes(upload.size_bytes)),
                EmbedField::new(
                    "Date",
                    upload.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ),
            ],
            footer: EmbedFooter {
                text: self.config.footer.clone(),
            },
            timestamp: upload.created_at.with_timezone(&Utc).to_rfc3339(),
        };

        WebhookMessage {
            embeds: vec![embed],
        }
    }

    fn send_message(&self, message: &WebhookMessage) -> Result<(), UploadError> {
        let response = self
            .client
            .post(&self.config.url)
            .json(message)
            .send()
            .map_err(|e| UploadError::Request(e, "send message"))?;

        check_response(response, "message")
    }

    fn send_file(&self, upload: &Upload) -> Result<(), UploadError> {
        let contents =
            fs::read(&upload.archive_path).map_err(|e| UploadError::Io(e, "read archive"))?;

        let part = Part::bytes(contents)
            .file_name(upload.file_name.clone())
            .mime_str("application/zip")
            .map_err(|e| UploadError::Request(e, "build file part"))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.config.url)
            .multipart(form)
            .send()
            .map_err(|e| UploadError::Request(e, "send file"))?;

        check_response(response, "file")
    }
}

impl UploadEndpoint for Webhook {
    fn upload(&self, upload: &Upload) -> Result<(), UploadError> {
        self.send_message(&self.message(upload))?;
        debug!("Sent message for {}", upload.file_name);

        self.send_file(upload)?;
        debug!("Sent file {}", upload.file_name);

        Ok(())
    }
}

fn check_response(response: Response, action: &'static str) -> Result<(), UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().unwrap_or_default();
    Err(UploadError::Rejected {
        action,
        status: status.as_u16(),
        body,
    })
}
