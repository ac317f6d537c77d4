//! Backup agent config
//!

use core::{fmt, str::FromStr, time::Duration};
use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize, de};
use thiserror::Error;

use crate::dump::DumpOptions;

/// The backup agent's config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The directory dumps and archives are written to.
    pub backup_directory: PathBuf,

    /// The database to back up.
    pub database: DatabaseConfig,

    /// How often to back up.
    pub interval: IntervalConfig,

    /// Flags passed to the dump program.
    #[serde(default)]
    pub dump: DumpOptions,

    /// Archive settings.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Where to upload archives.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// What to delete after a cycle.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl Config {
    /// Tries to load a config from a toml file.
    pub fn load_toml(file_path: PathBuf) -> Result<Self, LoadConfigError> {
        if !file_path.exists() {
            return Err(LoadConfigError::NoFile);
        }

        let contents = fs::read_to_string(file_path).map_err(LoadConfigError::Read)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Checks the values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let database = &self.database.database;
        if database.trim().is_empty() {
            return Err(ConfigError::NoDatabase);
        }

        // The name is used in file names inside `backup_directory`.
        if database.contains(['/', '\\']) || database == "." || database == ".." {
            return Err(ConfigError::DatabaseName(database.clone()));
        }

        if self.interval.time == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        if self.interval.period() > MAX_INTERVAL {
            return Err(ConfigError::IntervalTooLong);
        }

        if self.interval.warmup() > MAX_INTERVAL {
            return Err(ConfigError::WarmupTooLong);
        }

        if self.archive.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(ConfigError::CompressionLevel(
                self.archive.compression_level,
            ));
        }

        if self.webhook.enabled && self.webhook.url.trim().is_empty() {
            return Err(ConfigError::NoWebhookUrl);
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_directory: PathBuf::from("sql"),
            database: DatabaseConfig::default(),
            interval: IntervalConfig::default(),
            dump: DumpOptions::default(),
            archive: ArchiveConfig::default(),
            webhook: WebhookConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

/// Connection details for the database.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// The database host.
    pub host: String,

    /// The database port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// The user to connect as.
    pub user: String,

    /// The user's password.
    #[serde(default)]
    pub password: String,

    /// The name of the database to dump.
    pub database: String,
}

fn default_port() -> u16 {
    3306
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: default_port(),
            user: "root".to_string(),
            password: String::new(),
            database: "database".to_string(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// The unit of [`IntervalConfig::time`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum IntervalUnit {
    #[allow(missing_docs)]
    Seconds,
    #[allow(missing_docs)]
    Minutes,
    #[allow(missing_docs)]
    Hours,
}

impl IntervalUnit {
    /// The number of seconds in one of this unit.
    pub fn seconds(&self) -> u64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 60 * 60,
        }
    }
}

/// The longest allowed interval or warm-up, 366 days.
pub const MAX_INTERVAL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// How often a backup is made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalConfig {
    /// The number of units between backups.
    pub time: u64,

    /// The unit of `time`.
    #[serde(default = "default_unit")]
    pub unit: IntervalUnit,

    /// Seconds to wait before the first backup.
    #[serde(default)]
    pub warmup_seconds: u64,
}

fn default_unit() -> IntervalUnit {
    IntervalUnit::Minutes
}

impl IntervalConfig {
    /// The time between backups.
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.time.saturating_mul(self.unit.seconds()))
    }

    /// The time before the first backup.
    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_seconds)
    }
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            time: 30,
            unit: default_unit(),
            warmup_seconds: 0,
        }
    }
}

/// The highest deflate level.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Archive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Deflate level, `0` stores, `9` is smallest.
    pub compression_level: u32,

    /// Delete the dump as soon as the archive is written.
    pub delete_dump_after_archive: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: MAX_COMPRESSION_LEVEL,
            delete_dump_after_archive: false,
        }
    }
}

/// Webhook to upload archives to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// If archives should be uploaded.
    pub enabled: bool,

    /// The webhook URL.
    pub url: String,

    /// The embed author.
    pub author: String,

    /// The embed colour.
    pub color: EmbedColor,

    /// The embed footer.
    pub footer: String,

    /// Archives larger than this are not uploaded.
    pub max_upload_bytes: u64,

    /// Upload on a separate thread without holding up the next backup.
    pub background: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            author: "Database Backup".to_string(),
            color: EmbedColor(0x5865F2),
            footer: "db-backup".to_string(),
            max_upload_bytes: 10 * 1024 * 1024, // 10 MiB
            background: true,
        }
    }
}

/// What to delete after a cycle.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Delete the dump and archive once the upload has finished, was skipped or is disabled.
    pub delete_after_upload: bool,
}

/// An RGB embed colour, written as `"#rrggbb"` or an integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmbedColor(pub u32);

impl FromStr for EmbedColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex.is_empty() || hex.len() > 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid colour '{s}', expected #rrggbb"));
        }

        u32::from_str_radix(hex, 16)
            .map(Self)
            .map_err(|_| format!("invalid colour '{s}', expected #rrggbb"))
    }
}

impl fmt::Display for EmbedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

impl<'de> Deserialize<'de> for EmbedColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawColor {
            Integer(u32),
            Hex(String),
        }

        match RawColor::deserialize(deserializer)? {
            RawColor::Integer(value) if value <= 0xFF_FFFF => Ok(Self(value)),
            RawColor::Integer(value) => Err(de::Error::custom(format!(
                "colour {value} is larger than 0xffffff"
            ))),
            RawColor::Hex(string) => Self::from_str(&string).map_err(de::Error::custom),
        }
    }
}

impl Serialize for EmbedColor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("The file does not exist.")]
    NoFile,

    #[error("Failed to read the file:\n{0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to deserialize the file:\n{0}")]
    Deserialize(#[from] toml::de::Error),

    #[error("The config is invalid:\n{0}")]
    Invalid(#[from] ConfigError),
}

#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("database.database must not be empty")]
    NoDatabase,

    #[error("database.database '{0}' must not contain path separators")]
    DatabaseName(String),

    #[error("interval.time must be greater than zero")]
    ZeroInterval,

    #[error("interval must not be longer than 366 days")]
    IntervalTooLong,

    #[error("interval.warmup_seconds must not be longer than 366 days")]
    WarmupTooLong,

    #[error("archive.compression_level {0} is above 9")]
    CompressionLevel(u32),

    #[error("webhook.url must be set when the webhook is enabled")]
    NoWebhookUrl,
}
