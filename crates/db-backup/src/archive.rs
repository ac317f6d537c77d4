//! Compress a dump into a single entry zip archive.
//!

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{DateTime, Datelike, Local, Timelike};
use thiserror::Error;
use tracing::warn;
use zip::{CompressionMethod, ZipWriter, result::ZipError, write::SimpleFileOptions};

/// The extension given to archives.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// The archive path for a dump, the dump path with its extension replaced.
pub fn archive_path_for(dump_path: &Path) -> PathBuf {
    dump_path.with_extension(ARCHIVE_EXTENSION)
}

/// Sizes of a finished archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Size of the source file.
    pub input_bytes: u64,

    /// Size of the archive.
    pub output_bytes: u64,
}

impl ArchiveReport {
    /// The archive size as a fraction of the source size.
    #[allow(clippy::as_conversions, clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        if self.input_bytes == 0 {
            return 1.0;
        }

        self.output_bytes as f64 / self.input_bytes as f64
    }

    /// Percentage of the source saved by compressing.
    pub fn saved_percent(&self) -> f64 {
        (1.0 - self.ratio()) * 100.0
    }
}

/// Formats a byte count with binary units, `"1.50 MiB"`.
#[allow(clippy::as_conversions, clippy::cast_precision_loss)]
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut units = UNITS.iter().peekable();
    let mut unit = "B";
    while let Some(next) = units.next() {
        unit = next;
        if value < 1024.0 || units.peek().is_none() {
            break;
        }
        value /= 1024.0;
    }

    format!("{value:.2} {unit}")
}

/// Compress `source` into a new zip archive at `destination`.
///
/// The archive holds one entry named after the source's file name. `level` is the deflate level,
/// `0..=9`. On failure nothing is left at `destination`.
pub fn compress_file(
    source: &Path,
    destination: &Path,
    level: u32,
) -> Result<ArchiveReport, ArchiveError> {
    let entry_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ArchiveError::EntryName(source.to_path_buf()))?
        .to_string();

    // Open the source first so an unreadable source leaves no archive behind.
    let source_file = File::open(source).map_err(|e| ArchiveError::Io(e, "open source"))?;
    let source_metadata = source_file
        .metadata()
        .map_err(|e| ArchiveError::Io(e, "read source metadata"))?;
    let input_bytes = source_metadata.len();

    // Deflate starts at level 1, level 0 stores the dump as is.
    let (method, level) = match level {
        0 => (CompressionMethod::Stored, None),
        level => (CompressionMethod::Deflated, Some(i64::from(level))),
    };
    let mut options = SimpleFileOptions::default()
        .compression_method(method)
        .compression_level(level)
        .large_file(input_bytes >= u64::from(u32::MAX));

    match source_metadata.modified() {
        Ok(modified) => match zip_date_time(modified) {
            Some(date_time) => options = options.last_modified_time(date_time),
            None => warn!("Modification time of {source:?} cannot be stored in a zip, using default"),
        },
        Err(error) => warn!("Could not read modification time of {source:?}: {error}"),
    }

    let destination_file =
        File::create(destination).map_err(|e| ArchiveError::Io(e, "create archive"))?;

    let result = write_archive(source_file, destination_file, &entry_name, options);
    if result.is_err() {
        if let Err(error) = fs::remove_file(destination) {
            warn!("Could not remove partial archive {destination:?}: {error}");
        }
    }

    let output_bytes = result?;

    Ok(ArchiveReport {
        input_bytes,
        output_bytes,
    })
}

fn write_archive(
    source: File,
    destination: File,
    entry_name: &str,
    options: SimpleFileOptions,
) -> Result<u64, ArchiveError> {
    let mut zip = ZipWriter::new(BufWriter::new(destination));

    zip.start_file(entry_name, options)?;
    io::copy(&mut BufReader::new(source), &mut zip)
        .map_err(|e| ArchiveError::Io(e, "compress source"))?;

    let mut writer = zip.finish()?;
    writer
        .flush()
        .map_err(|e| ArchiveError::Io(e, "flush archive"))?;

    let file = writer
        .into_inner()
        .map_err(|e| ArchiveError::Io(e.into_error(), "flush archive"))?;
    file.sync_all()
        .map_err(|e| ArchiveError::Io(e, "sync archive"))?;

    let output_bytes = file
        .metadata()
        .map_err(|e| ArchiveError::Io(e, "read archive metadata"))?
        .len();

    Ok(output_bytes)
}

/// Converts a file time to a zip timestamp, `None` when outside 1980..=2107.
fn zip_date_time(time: SystemTime) -> Option<zip::DateTime> {
    let local: DateTime<Local> = time.into();

    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).ok()?,
        u8::try_from(local.month()).ok()?,
        u8::try_from(local.day()).ok()?,
        u8::try_from(local.hour()).ok()?,
        u8::try_from(local.minute()).ok()?,
        u8::try_from(local.second()).ok()?,
    )
    .ok()
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Source {0:?} has no valid UTF-8 file name")]
    EntryName(PathBuf),

    #[error("Failed to {1}: {0}")]
    Io(#[source] io::Error, &'static str),

    #[error("Zip error: {0}")]
    Zip(#[from] ZipError),
}
