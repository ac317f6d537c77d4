//! Repeating timer that starts backup cycles.
//!

use core::time::Duration;
use std::{
    io,
    sync::{Arc, mpsc::Receiver},
    thread::{self, JoinHandle},
    time::Instant,
};

use tracing::{error, info};

use crate::{
    config::{IntervalConfig, MAX_INTERVAL},
    runner::{BackupRunner, UploadReport},
};

/// Fires the runner every period after an initial warm-up.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    /// Time between ticks.
    pub period: Duration,

    /// Time before the first tick.
    pub warmup: Duration,
}

impl Scheduler {
    /// Create a scheduler from the interval config.
    pub fn new(interval: &IntervalConfig) -> Self {
        Self {
            period: interval.period(),
            warmup: interval.warmup(),
        }
    }

    /// Tick forever.
    pub fn run(&self, runner: &Arc<BackupRunner>) -> ! {
        info!(
            "First backup in {:?}, then every {:?}",
            self.warmup, self.period
        );

        let mut deadline = later(Instant::now(), self.warmup);
        loop {
            if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                thread::sleep(wait);
            }

            self.fire(runner);

            deadline = self.next_deadline(deadline, Instant::now());
        }
    }

    /// The deadline after `deadline`. If that has already passed the next tick is `now`, missed
    /// ticks are not made up.
    pub fn next_deadline(&self, deadline: Instant, now: Instant) -> Instant {
        let next = later(deadline, self.period);
        if next < now { now } else { next }
    }

    /// Start a cycle on its own thread unless one is already running.
    pub fn fire(&self, runner: &Arc<BackupRunner>) -> Option<JoinHandle<()>> {
        let database = &runner.config().database.database;

        let Some(guard) = runner.try_begin() else {
            info!(
                "[{database}] Backup #{} is still running, skipping this tick",
                runner.counter()
            );
            return None;
        };

        let cycle_runner = Arc::clone(runner);
        let spawned = thread::Builder::new()
            .name(format!("backup-cycle-{}", runner.counter() + 1))
            .spawn(move || {
                // Errors are logged by the runner.
                let _ = cycle_runner.run_cycle(&guard);
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(error) => {
                error!("[{database}] Could not start backup thread: {error}");
                None
            }
        }
    }
}

/// `instant + duration`, capped at [`MAX_INTERVAL`] when the sum would overflow.
fn later(instant: Instant, duration: Duration) -> Instant {
    instant
        .checked_add(duration)
        .or_else(|| instant.checked_add(MAX_INTERVAL))
        .unwrap_or(instant)
}

/// Log every background upload report as it arrives. Ends once the runner and its uploads are gone.
pub fn spawn_upload_reporter(reports: Receiver<UploadReport>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("upload-reporter".to_string())
        .spawn(move || {
            for report in reports {
                report.log();
            }
        })
}
