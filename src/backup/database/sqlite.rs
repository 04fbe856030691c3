use crate::backup::database::DatabaseEngine;
use crate::backup::result_error::result::Result;
use getset::Getters;
use rusqlite::{Connection, OpenFlags, OptionalExtension, MAIN_DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use validator::{Validate, ValidationError};

/// SQLite database file backed up through the online backup API.
///
/// The snapshot is consistent even while other processes write to the
/// database. The main schema is always the one copied; `database_name`
/// only labels the run.
#[derive(Serialize, Deserialize, Debug, Clone, Validate, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct SqliteDatabaseConfig {
    #[validate(custom(function = validate_sql_file))]
    path: Arc<Path>,
}

impl SqliteDatabaseConfig {
    pub fn new<P: Into<Arc<Path>>>(path: P) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> Result<Connection> {
        Ok(Connection::open_with_flags(
            self.path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?)
    }
}

impl DatabaseEngine for SqliteDatabaseConfig {
    fn query_active_host(&self, query: &str) -> Result<Option<String>> {
        let conn = self.open()?;
        // compared verbatim, no trimming
        Ok(conn
            .query_row(query, [], |row| row.get::<_, Option<String>>(0))
            .optional()?
            .flatten())
    }

    fn backup_to(&self, database: &str, output: &Path) -> Result<()> {
        tracing::debug!("SQLite online backup of {:?} ({})", self.path, database);
        let conn = self.open()?;
        conn.backup(MAIN_DB, output, None)?;
        Ok(())
    }
}

fn validate_sql_file(path: &Arc<Path>) -> std::result::Result<(), ValidationError> {
    Connection::open_with_flags(
        path.as_ref(),
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map(|_| ())
    .map_err(|e| {
        ValidationError::new("InvalidSqlFile")
            .with_message(format!("cannot open sql file {:?}: {}", path, e).into())
    })
}
