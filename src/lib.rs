//! # db_backup
//!
//! Daily encrypted database backup for clustered deployments.
//!
//! ## Features
//!
//! - **Host Guard**: Only the node currently serving the database takes the backup
//! - **Engines**: SQLite online backup, or any external dump command
//! - **Compression**: XZ (LZMA) with parallel processing, or gzip
//! - **Encryption**: Age public-key encryption to one or more recipients
//! - **Archiving**: Dated artifacts moved to an offsite directory
//! - **Retention**: Deletes archives older than the configured number of days
//!
//! ## Quick Start
//!
//! ```no_run
//! use db_backup::backup::backup_config::BackupConfig;
//! use db_backup::backup::pipeline::RunOutcome;
//!
//! let config = BackupConfig::load("config.yml")?;
//! match config.run(chrono::Local::now().date_naive())? {
//!     RunOutcome::Completed { archived, .. } => println!("archived {:?}", archived),
//!     RunOutcome::Skipped(reason) => println!("skipped: {:?}", reason),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
