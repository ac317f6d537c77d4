//! Runs backup cycles.
//!

use std::{
    fs, io,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, Receiver, SendError, Sender},
    },
    thread,
    time::Instant,
};

use chrono::Local;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    archive::{ArchiveError, compress_file, human_bytes},
    cleanup::{cleanup, remove_file},
    config::Config,
    context::{Context, Stage},
    cycle::BackupCycle,
    dump::{DumpError, Dumper, MysqlDump},
    endpoint::{Upload, UploadEndpoint, UploadError, Webhook},
};

/// How a cycle that did not fail ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No endpoint is configured, the archive stays local.
    UploadDisabled,

    /// The archive was over the upload size limit.
    SkippedTooLarge,

    /// The upload was handed to a background thread, its result arrives as an [`UploadReport`].
    UploadDispatched,

    /// The upload ran inline and succeeded.
    Uploaded,

    /// The upload ran inline and failed.
    UploadFailed,
}

/// The result of asking the runner to back up.
#[derive(Debug)]
pub enum TickOutcome {
    /// A cycle was already running so nothing was done.
    Skipped,

    /// A cycle ran.
    Ran(Result<CycleOutcome, CycleError>),
}

/// The result of an upload, sent by background uploads once they finish.
#[derive(Debug)]
pub struct UploadReport {
    /// The context of the cycle that made the archive.
    pub context: Context,

    /// The uploaded archive.
    pub archive_path: PathBuf,

    /// The upload's result.
    pub result: Result<(), UploadError>,

    /// The number of files cleanup deleted after the upload.
    pub deleted: usize,
}

impl UploadReport {
    /// Log the result of the upload.
    pub fn log(&self) {
        let context = &self.context;
        match &self.result {
            Ok(()) => info!("{context}Uploaded {:?}", self.archive_path),
            Err(error) => error!("{context}Failed to upload {:?}: {error}", self.archive_path),
        }
    }
}

/// Marks a cycle as running, releases the runner when dropped.
#[derive(Debug)]
pub struct CycleGuard {
    running: Arc<AtomicBool>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Owns everything a backup cycle needs and makes sure only one cycle runs at a time.
pub struct BackupRunner {
    config: Config,
    dumper: Box<dyn Dumper>,
    endpoint: Option<Arc<dyn UploadEndpoint>>,

    /// The number of cycles started.
    counter: AtomicU64,

    /// Set while a cycle is running.
    running: Arc<AtomicBool>,

    /// Background uploads report here.
    reports: Sender<UploadReport>,
}

impl BackupRunner {
    /// Create a runner, returns the receiver for background upload reports.
    pub fn new(
        config: Config,
        dumper: Box<dyn Dumper>,
        endpoint: Option<Arc<dyn UploadEndpoint>>,
    ) -> (Self, Receiver<UploadReport>) {
        let (reports, receiver) = mpsc::channel();

        let runner = Self {
            config,
            dumper,
            endpoint,
            counter: AtomicU64::new(0),
            running: Arc::new(AtomicBool::new(false)),
            reports,
        };

        (runner, receiver)
    }

    /// Create a runner that dumps with `mysqldump` and uploads to the configured webhook.
    pub fn from_config(config: Config) -> Result<(Self, Receiver<UploadReport>), UploadError> {
        let dumper = MysqlDump::new(config.database.clone(), config.dump.clone());

        let endpoint: Option<Arc<dyn UploadEndpoint>> = if config.webhook.enabled {
            Some(Arc::new(Webhook::new(config.webhook.clone())?))
        } else {
            None
        };

        Ok(Self::new(config, Box::new(dumper), endpoint))
    }

    /// The runner's config.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The number of cycles started.
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// If a cycle is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the runner for a cycle, `None` if a cycle is already running.
    pub fn try_begin(&self) -> Option<CycleGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        Some(CycleGuard {
            running: Arc::clone(&self.running),
        })
    }

    /// Run a cycle on the current thread unless one is already running.
    pub fn tick(&self) -> TickOutcome {
        let Some(guard) = self.try_begin() else {
            info!(
                "[{}] Backup #{} is still running, skipping",
                self.config.database.database,
                self.counter()
            );
            return TickOutcome::Skipped;
        };

        TickOutcome::Ran(self.run_cycle(&guard))
    }

    /// Run one dump, compress, upload and cleanup cycle. Errors are logged before being returned.
    pub fn run_cycle(&self, _guard: &CycleGuard) -> Result<CycleOutcome, CycleError> {
        let sequence = self.counter.fetch_add(1, Ordering::AcqRel) + 1;
        let cycle = BackupCycle::new(
            &self.config.backup_directory,
            &self.config.database.database,
            sequence,
            Local::now(),
        );

        let mut context = Context::new(&cycle.database, sequence);
        info!("{context}Starting backup");

        match self.execute(&mut context, &cycle) {
            Ok(outcome) => {
                context.stage = Stage::Idle;
                info!("{context}Backup finished: {outcome:?}");
                Ok(outcome)
            }
            Err(error) => {
                error!("{context}Backup failed: {error}");
                Err(error)
            }
        }
    }

    fn execute(
        &self,
        context: &mut Context,
        cycle: &BackupCycle,
    ) -> Result<CycleOutcome, CycleError> {
        fs::create_dir_all(&self.config.backup_directory)
            .map_err(|e| CycleError::Io(e, "create backup directory"))?;

        // Dump
        context.stage = Stage::Dumping;
        let started = Instant::now();
        if let Err(error) = self.dumper.dump(&cycle.dump_path) {
            remove_file(context, &cycle.dump_path);
            return Err(CycleError::Dump(error));
        }
        info!(
            "{context}Dumped to {:?} in {:.1?}",
            cycle.dump_path,
            started.elapsed()
        );

        // Compress
        context.stage = Stage::Compressing;
        let started = Instant::now();
        let report = compress_file(
            &cycle.dump_path,
            &cycle.archive_path,
            self.config.archive.compression_level,
        )?;
        info!(
            "{context}Compressed {} to {} ({:.1}% smaller) in {:.1?}",
            human_bytes(report.input_bytes),
            human_bytes(report.output_bytes),
            report.saved_percent(),
            started.elapsed()
        );

        if self.config.archive.delete_dump_after_archive {
            remove_file(context, &cycle.dump_path);
        }

        let delete = self.config.cleanup.delete_after_upload;

        let Some(endpoint) = &self.endpoint else {
            context.stage = Stage::UploadDisabled;
            info!("{context}Archive saved to {:?}", cycle.archive_path);
            cleanup(context, &cycle.dump_path, &cycle.archive_path, delete);
            return Ok(CycleOutcome::UploadDisabled);
        };

        let limit = self.config.webhook.max_upload_bytes;
        if report.output_bytes > limit {
            context.stage = Stage::SkippedTooLarge;
            warn!(
                "{context}Archive is {}, over the {} upload limit",
                human_bytes(report.output_bytes),
                human_bytes(limit)
            );
            cleanup(context, &cycle.dump_path, &cycle.archive_path, delete);
            return Ok(CycleOutcome::SkippedTooLarge);
        }

        // Upload
        context.stage = Stage::Uploading;
        let task = UploadTask {
            endpoint: Arc::clone(endpoint),
            upload: Upload {
                database: cycle.database.clone(),
                archive_path: cycle.archive_path.clone(),
                file_name: cycle.archive_file_name(),
                size_bytes: report.output_bytes,
                created_at: cycle.started_at,
            },
            context: context.clone(),
            dump_path: cycle.dump_path.clone(),
            delete,
        };

        if !self.config.webhook.background {
            let report = task.run();
            report.log();
            return match report.result {
                Ok(()) => Ok(CycleOutcome::Uploaded),
                Err(_) => Ok(CycleOutcome::UploadFailed),
            };
        }

        let reports = self.reports.clone();
        let spawned = thread::Builder::new()
            .name(format!("backup-upload-{}", cycle.sequence))
            .spawn(move || {
                let report = task.run();
                if let Err(SendError(report)) = reports.send(report) {
                    report.log();
                }
            });

        match spawned {
            Ok(_) => {
                info!("{context}Uploading {} in the background", cycle.archive_file_name());
                Ok(CycleOutcome::UploadDispatched)
            }
            Err(error) => {
                cleanup(context, &cycle.dump_path, &cycle.archive_path, delete);
                Err(CycleError::Io(error, "spawn upload thread"))
            }
        }
    }
}

/// An upload followed by its cleanup.
struct UploadTask {
    endpoint: Arc<dyn UploadEndpoint>,
    upload: Upload,
    context: Context,
    dump_path: PathBuf,
    delete: bool,
}

impl UploadTask {
    fn run(self) -> UploadReport {
        let Self {
            endpoint,
            upload,
            context,
            dump_path,
            delete,
        } = self;

        let result = endpoint.upload(&upload);

        let mut cleanup_context = context.clone();
        let deleted = cleanup(
            &mut cleanup_context,
            &dump_path,
            &upload.archive_path,
            delete,
        );

        UploadReport {
            context,
            archive_path: upload.archive_path,
            result,
            deleted,
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Failed to {1}: {0}")]
    Io(#[source] io::Error, &'static str),

    #[error("Failed to dump the database: {0}")]
    Dump(#[from] DumpError),

    #[error("Failed to compress the dump: {0}")]
    Archive(#[from] ArchiveError),
}
