pub mod command;
pub mod sqlite;

use crate::backup::database::command::CommandDatabaseConfig;
use crate::backup::database::sqlite::SqliteDatabaseConfig;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use derive_more::From;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::result;
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

/// The database engine the backup is taken from
///
/// The engine answers two questions for the pipeline: which host currently
/// serves the database, and how to write a native full backup to a file.
#[derive(Clone, From, Serialize, Deserialize, Debug)]
#[serde(tag = "engine_type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum DatabaseConfig {
    /// SQLite online backup API, run in process through rusqlite
    Sqlite(SqliteDatabaseConfig),

    /// External dump tool (`sqlcmd`, `pg_dump`, `mysqldump`, ...)
    Command(CommandDatabaseConfig),
}

pub trait DatabaseEngine {
    /// Runs the engine-specific active host query.
    ///
    /// `Ok(None)` means the query ran but produced no host name.
    fn query_active_host(&self, query: &str) -> Result<Option<String>>;

    /// Writes a full native backup of `database` to `output`.
    fn backup_to(&self, database: &str, output: &Path) -> Result<()>;
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            DatabaseConfig::Sqlite(inner) => inner.validate(),
            DatabaseConfig::Command(inner) => inner.validate(),
        }
    }
}

impl DatabaseEngine for DatabaseConfig {
    fn query_active_host(&self, query: &str) -> Result<Option<String>> {
        match self {
            DatabaseConfig::Sqlite(c) => c.query_active_host(query),
            DatabaseConfig::Command(c) => c.query_active_host(query),
        }
        .with_debug_object_and_fn_name(self.clone(), "query_active_host")
    }

    fn backup_to(&self, database: &str, output: &Path) -> Result<()> {
        match self {
            DatabaseConfig::Sqlite(c) => c.backup_to(database, output),
            DatabaseConfig::Command(c) => c.backup_to(database, output),
        }
        .with_debug_object_and_fn_name(self.clone(), "backup_to")
    }
}

/// Produces the plaintext dump of `database` at `output`.
///
/// A leftover dump from an earlier attempt on the same day is replaced. The
/// dump only counts as successful if the engine reported no error and the
/// file exists afterwards.
pub fn dump<E: DatabaseEngine + ?Sized>(engine: &E, database: &str, output: &Path) -> Result<()> {
    if output.exists() {
        warn!("Replacing earlier dump {:?}", output);
        std::fs::remove_file(output)
            .map_err(Error::from)
            .with_msg(format!("Remove stale dump {:?} failed", output))?;
    }

    info!("Backing up database {:?} to {:?}", database, output);
    engine.backup_to(database, output)?;

    if !output.is_file() {
        return Err(Error::DumpMissing(output.to_path_buf()));
    }

    info!("Database dump finished: {:?}", output);
    Ok(())
}

/// First non-empty trimmed line of a query result.
pub(crate) fn first_host_line(raw: &str) -> Option<String> {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
