//! # db-backup
//! Backs up a database on a timer until the process is stopped.
//!

use std::{fs, path::PathBuf, process::ExitCode, sync::Arc};

use db_backup::{BackupRunner, Config, Scheduler, scheduler::spawn_upload_reporter};
use mimalloc::MiMalloc;
use shared::{Failure, init_logger};
use tracing::{error, info};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const CONFIG_FILE: &str = "./config.toml";

fn main() -> ExitCode {
    let _logger = match init_logger() {
        Ok(guards) => guards,
        Err(error) => {
            eprintln!("Could not initialise logger: {error}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize config if args include 'init'.
    if std::env::args().any(|arg| arg.eq("init")) {
        return write_default_config();
    }

    // Load config
    let config =
        Config::load_toml(PathBuf::from(CONFIG_FILE)).or_log_and_panic("Could not load config");
    let scheduler = Scheduler::new(&config.interval);

    // Create runner
    let (runner, reports) =
        BackupRunner::from_config(config).or_log_and_panic("Could not create runner");
    let runner = Arc::new(runner);

    let _reporter =
        spawn_upload_reporter(reports).or_log_and_panic("Could not start upload reporter");

    info!(
        "Backing up '{}' to {:?}",
        runner.config().database.database,
        runner.config().backup_directory
    );

    scheduler.run(&runner)
}

fn write_default_config() -> ExitCode {
    if PathBuf::from(CONFIG_FILE).exists() {
        error!("{CONFIG_FILE} already exists, not overwriting it");
        return ExitCode::FAILURE;
    }

    let contents = match toml::to_string_pretty(&Config::default()) {
        Ok(contents) => contents,
        Err(error) => {
            error!("Could not serialize config file: {error}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = fs::write(CONFIG_FILE, contents) {
        error!("Could not create config file: {error}");
        return ExitCode::FAILURE;
    }

    info!("Wrote {CONFIG_FILE}");
    ExitCode::SUCCESS
}
