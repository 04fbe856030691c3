use crate::backup::compress::CompressorConfig;
use crate::backup::database::DatabaseConfig;
use crate::backup::encrypt::EncryptorConfig;
use crate::backup::host_guard::HostGuardConfig;
use crate::backup::pipeline::{BackupPipeline, RunOutcome};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::retention::RetentionConfig;
use crate::backup::validate::{validate_database_name, validate_dir_exist, validate_writable_dir};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use validator::Validate;

/// Everything a backup run needs, loaded once at start and never mutated.
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, Validate)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Local directory for the transient plaintext dump and ciphertext
    #[validate(custom(function = validate_writable_dir))]
    pub staging_dir: Arc<Path>,
    /// Durable destination, typically a mounted offsite share
    #[validate(custom(function = validate_dir_exist))]
    pub archive_dir: Arc<Path>,
    #[validate(custom(function = validate_database_name))]
    pub database_name: Arc<str>,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub encryptor: EncryptorConfig,
    #[serde(default)]
    #[validate(nested)]
    pub compressor: CompressorConfig,
    #[validate(nested)]
    pub retention: Option<RetentionConfig>,
    #[validate(nested)]
    pub host_guard: Option<HostGuardConfig>,
}

impl BackupConfig {
    /// Reads and validates a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .with_msg(format!("Open config failed: {:?}", path))
            .and_then(|f| {
                serde_yml::from_reader::<_, BackupConfig>(f)
                    .map_err(Error::from)
                    .with_msg(format!("Parse YAML config failed: {:?}", path))
            })
            .and_then(|bc| {
                bc.validate()
                    .map_err(Error::from)
                    .map(|_| bc)
                    .with_msg(format!("Config validation failed: {:?}", path))
            })
    }

    /// Runs the whole pipeline for `today` against the configured database.
    pub fn run(&self, today: NaiveDate) -> Result<RunOutcome> {
        BackupPipeline::new(self, &self.database).run(today)
    }
}
