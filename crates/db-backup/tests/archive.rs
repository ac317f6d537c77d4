//! Tests for archiving dumps
//!

#![allow(missing_docs)]

use std::{
    fs::{self, File},
    io::Read,
    path::Path,
};

use common::sql_contents;
use db_backup::archive::{ArchiveError, archive_path_for, compress_file, human_bytes};
use zip::ZipArchive;

mod common;

#[test]
fn single_entry_named_after_source() {
    let directory = tempfile::tempdir().unwrap();
    let source = directory.path().join("test_db-1-1700000000000.sql");
    let destination = archive_path_for(&source);
    let contents = sql_contents();
    fs::write(&source, &contents).unwrap();

    let report = compress_file(&source, &destination, 9).unwrap();

    assert_eq!(report.input_bytes, u64::try_from(contents.len()).unwrap());
    assert_eq!(
        report.output_bytes,
        fs::metadata(&destination).unwrap().len()
    );
    assert!(report.output_bytes < report.input_bytes);
    assert!(report.ratio() < 1.0);
    assert!(report.saved_percent() > 0.0);

    let mut archive = ZipArchive::new(File::open(&destination).unwrap()).unwrap();
    assert_eq!(archive.len(), 1);

    let mut entry = archive.by_index(0).unwrap();
    assert_eq!(entry.name(), "test_db-1-1700000000000.sql");
    assert_eq!(entry.compression(), zip::CompressionMethod::Deflated);

    let mut extracted = Vec::new();
    entry.read_to_end(&mut extracted).unwrap();
    assert_eq!(extracted, contents);
}

#[test]
fn empty_source() {
    let directory = tempfile::tempdir().unwrap();
    let source = directory.path().join("empty.sql");
    let destination = directory.path().join("empty.zip");
    fs::write(&source, b"").unwrap();

    let report = compress_file(&source, &destination, 9).unwrap();

    assert_eq!(report.input_bytes, 0);
    assert!((report.ratio() - 1.0).abs() < f64::EPSILON);
    assert!(destination.exists());
}

#[test]
fn missing_source_creates_no_archive() {
    let directory = tempfile::tempdir().unwrap();
    let source = directory.path().join("missing.sql");
    let destination = directory.path().join("missing.zip");

    let result = compress_file(&source, &destination, 9);

    assert!(matches!(result, Err(ArchiveError::Io(_, "open source"))));
    assert!(!destination.exists());
}

#[test]
fn unwritable_destination() {
    let directory = tempfile::tempdir().unwrap();
    let source = directory.path().join("dump.sql");
    let destination = directory.path().join("missing-directory").join("dump.zip");
    fs::write(&source, sql_contents()).unwrap();

    let result = compress_file(&source, &destination, 9);

    assert!(matches!(result, Err(ArchiveError::Io(_, "create archive"))));
}

#[test]
fn archive_path_replaces_extension() {
    assert_eq!(
        archive_path_for(Path::new("sql/test_db-3-1700000000000.sql")),
        Path::new("sql/test_db-3-1700000000000.zip")
    );

    // Only the file's extension changes, not a directory that looks like one.
    assert_eq!(
        archive_path_for(Path::new("backups.sql/test_db-3-1.sql")),
        Path::new("backups.sql/test_db-3-1.zip")
    );
}

#[test]
fn human_readable_sizes() {
    assert_eq!(human_bytes(0), "0 B");
    assert_eq!(human_bytes(1023), "1023 B");
    assert_eq!(human_bytes(1536), "1.50 KiB");
    assert_eq!(human_bytes(10 * 1024 * 1024), "10.00 MiB");
    assert_eq!(human_bytes(3 * 1024 * 1024 * 1024), "3.00 GiB");
}

#[test]
fn level_zero_stores() {
    let directory = tempfile::tempdir().unwrap();
    let source = directory.path().join("stored.sql");
    let destination = archive_path_for(&source);
    fs::write(&source, sql_contents()).unwrap();

    let report = compress_file(&source, &destination, 0).unwrap();

    assert!(report.output_bytes > report.input_bytes);

    let mut archive = ZipArchive::new(File::open(&destination).unwrap()).unwrap();
    let entry = archive.by_index(0).unwrap();
    assert_eq!(entry.compression(), zip::CompressionMethod::Stored);
}
