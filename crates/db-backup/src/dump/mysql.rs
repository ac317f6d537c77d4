use std::{
    ffi::OsString,
    path::Path,
    process::{Command, Stdio},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DatabaseConfig;

use super::{DumpError, Dumper};

/// Flags controlling how `mysqldump` trades speed, consistency and output size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    /// The dump program.
    pub program: String,

    /// Stream rows instead of buffering whole tables (`--quick`).
    pub quick: bool,

    /// Dump inside one transaction for a consistent snapshot (`--single-transaction`).
    pub single_transaction: bool,

    /// Do not lock tables while dumping (`--skip-lock-tables`).
    pub skip_lock_tables: bool,

    /// Omit `LOCK TABLES` statements from the output (`--skip-add-locks`).
    pub skip_add_locks: bool,

    /// Omit comments from the output (`--skip-comments`).
    pub skip_comments: bool,

    /// Omit `DROP TABLE` statements from the output (`--skip-add-drop-table`).
    pub skip_add_drop_table: bool,

    /// Compress traffic between the server and `mysqldump` (`--compress`).
    ///
    /// This does not compress the dump file.
    pub compress_protocol: bool,

    /// Passed to the program after the other flags.
    pub extra_arguments: Vec<String>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            program: "mysqldump".to_string(),
            quick: true,
            single_transaction: true,
            skip_lock_tables: true,
            skip_add_locks: true,
            skip_comments: true,
            skip_add_drop_table: false,
            compress_protocol: false,
            extra_arguments: Vec::new(),
        }
    }
}

/// Dump a MySQL or MariaDB database with `mysqldump`.
#[derive(Debug, Clone)]
pub struct MysqlDump {
    /// The database to dump.
    pub database: DatabaseConfig,

    /// The flags to dump with.
    pub options: DumpOptions,
}

impl MysqlDump {
    /// Create a new dumper.
    pub fn new(database: DatabaseConfig, options: DumpOptions) -> Self {
        Self { database, options }
    }

    /// The arguments passed to the dump program. The password is not included.
    pub fn arguments(&self, destination: &Path) -> Vec<OsString> {
        let mut arguments: Vec<OsString> = vec![
            format!("--host={}", self.database.host).into(),
            format!("--port={}", self.database.port).into(),
            format!("--user={}", self.database.user).into(),
        ];

        let flags = [
            (self.options.quick, "--quick"),
            (self.options.single_transaction, "--single-transaction"),
            (self.options.skip_lock_tables, "--skip-lock-tables"),
            (self.options.skip_add_locks, "--skip-add-locks"),
            (self.options.skip_comments, "--skip-comments"),
            (self.options.skip_add_drop_table, "--skip-add-drop-table"),
            (self.options.compress_protocol, "--compress"),
        ];
        arguments.extend(
            flags
                .into_iter()
                .filter(|(enabled, _)| *enabled)
                .map(|(_, flag)| OsString::from(flag)),
        );

        arguments.extend(self.options.extra_arguments.iter().map(OsString::from));

        let mut result_file = OsString::from("--result-file=");
        result_file.push(destination);
        arguments.push(result_file);

        arguments.push(OsString::from(&self.database.database));

        arguments
    }
}

impl Dumper for MysqlDump {
    fn dump(&self, destination: &Path) -> Result<(), DumpError> {
        let arguments = self.arguments(destination);
        debug!("Running '{}' with {arguments:?}", self.options.program);

        let mut command = Command::new(&self.options.program);
        command.args(arguments).stdin(Stdio::null());

        // Keep the password out of the process list.
        if !self.database.password.is_empty() {
            command.env("MYSQL_PWD", &self.database.password);
        }

        let output = command
            .output()
            .map_err(|e| DumpError::RunCommand(e, self.options.program.clone()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DumpError::CommandErrored {
                program: self.options.program.clone(),
                status: output.status,
                stderr,
            });
        }

        Ok(())
    }
}
