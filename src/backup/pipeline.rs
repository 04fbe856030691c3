//! One daily backup run: guard, dump, encrypt, archive, prune.

use crate::backup::archiver::archive;
use crate::backup::artifact::ArtifactNames;
use crate::backup::backup_config::BackupConfig;
use crate::backup::database::{dump, DatabaseEngine};
use crate::backup::encrypt::encrypt_file;
use crate::backup::host_guard::HostGuardOutcome;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::stage::Stage;
use crate::backup::result_error::{InStage, WithMsg};
use crate::backup::retention::PruneReport;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        archived: PathBuf,
        /// `None` when retention is not configured or pruning failed
        pruned: Option<PruneReport>,
    },
    /// The host guard stopped the run before any file was touched
    Skipped(HostGuardOutcome),
}

pub struct BackupPipeline<'a, E: DatabaseEngine + ?Sized> {
    config: &'a BackupConfig,
    engine: &'a E,
}

impl<'a, E: DatabaseEngine + ?Sized> BackupPipeline<'a, E> {
    pub fn new(config: &'a BackupConfig, engine: &'a E) -> Self {
        Self { config, engine }
    }

    /// Runs every stage in order, stopping at the first failing one.
    ///
    /// The returned error is tagged with the stage it came from. Retention
    /// runs after the archive succeeded and never fails the run.
    pub fn run(&self, today: NaiveDate) -> Result<RunOutcome> {
        if let Some(outcome) = self.guard()? {
            return Ok(RunOutcome::Skipped(outcome));
        }

        let config = self.config;
        let names = ArtifactNames::for_date(today);
        let plaintext = names.plaintext_in(&config.staging_dir);
        let encrypted = names.encrypted_in(&config.staging_dir);

        std::fs::create_dir_all(&config.staging_dir)
            .map_err(Error::from)
            .with_msg(format!("Create staging dir {:?} failed", config.staging_dir))
            .and_then(|_| dump(self.engine, &config.database_name, &plaintext))
            .in_stage(Stage::Dump)?;

        encrypt_file(&plaintext, &encrypted, &config.encryptor, &config.compressor)
            .in_stage(Stage::Encrypt)?;
        info!("Encrypted backup written to {:?}", encrypted);

        let archived =
            archive(&encrypted, &plaintext, &config.archive_dir).in_stage(Stage::Archive)?;

        let pruned = config.retention.as_ref().and_then(|retention| {
            match retention.prune(&config.archive_dir, today) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Retention pass failed: {}", e);
                    None
                }
            }
        });

        info!("Complete");
        Ok(RunOutcome::Completed { archived, pruned })
    }

    /// `Some` when this node must not take the backup.
    fn guard(&self) -> Result<Option<HostGuardOutcome>> {
        let Some(guard) = &self.config.host_guard else {
            info!("No host guard configured, running backup");
            return Ok(None);
        };

        let local = guard.resolve_local_hostname().in_stage(Stage::HostGuard)?;
        match guard.check(self.engine, &local).in_stage(Stage::HostGuard)? {
            HostGuardOutcome::Proceed => Ok(None),
            outcome => Ok(Some(outcome)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::compress::CompressorConfig;
    use crate::backup::database::sqlite::SqliteDatabaseConfig;
    use crate::backup::database::tests::FakeEngine;
    use crate::backup::encrypt::tests::write_key_files;
    use crate::backup::encrypt::EncryptorConfig;
    use crate::backup::host_guard::HostGuardConfig;
    use crate::backup::restore::decrypt_artifact;
    use crate::backup::retention::{RetentionConfig, RetentionMode};
    use age::x25519::Identity;
    use chrono::Days;
    use rusqlite::Connection;
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        identity: Identity,
        config: BackupConfig,
    }

    impl Fixture {
        fn staging(&self) -> &Path {
            &self.config.staging_dir
        }

        fn archive(&self) -> &Path {
            &self.config.archive_dir
        }

        fn decrypt(&self, path: &Path) -> Vec<u8> {
            let mut out = Vec::new();
            decrypt_artifact(
                BufReader::new(File::open(path).unwrap()),
                std::slice::from_ref(&self.identity),
                &self.config.compressor,
                &mut out,
            )
            .unwrap();
            out
        }
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let staging = root.path().join("staging");
        let archive = root.path().join("archive");
        let keys = root.path().join("keys");
        for dir in [&staging, &archive, &keys] {
            std::fs::create_dir_all(dir).unwrap();
        }

        let db = root.path().join("app.db");
        Connection::open(&db)
            .unwrap()
            .execute_batch(
                "CREATE TABLE primary_node (host TEXT);
                 INSERT INTO primary_node VALUES ('NODE-A');
                 CREATE TABLE orders (item TEXT);
                 INSERT INTO orders VALUES ('widget');",
            )
            .unwrap();

        let identity = Identity::generate();
        let encryptor: EncryptorConfig = write_key_files(&keys, std::slice::from_ref(&identity));

        let config = BackupConfig {
            staging_dir: Arc::from(staging.as_path()),
            archive_dir: Arc::from(archive.as_path()),
            database_name: Arc::from("Sales"),
            database: SqliteDatabaseConfig::new(db.as_path()).into(),
            encryptor,
            compressor: CompressorConfig::default(),
            retention: None,
            host_guard: None,
        };

        Fixture {
            root,
            identity,
            config,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
    }

    fn guarded(local: &str) -> Option<HostGuardConfig> {
        Some(HostGuardConfig::new(
            "SELECT host FROM primary_node",
            Some(local.into()),
            true,
        ))
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn test_sqlite_end_to_end() {
        let mut fx = fixture();
        fx.config.host_guard = guarded("NODE-A");

        let outcome = fx.config.run(today()).unwrap();

        let RunOutcome::Completed { archived, pruned } = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(archived, fx.archive().join("03-04-2025.bak.encrypted"));
        assert!(pruned.is_none());
        assert!(entries(fx.staging()).is_empty());
        assert_eq!(entries(fx.archive()), ["03-04-2025.bak.encrypted"]);

        let restored = fx.root.path().join("restored.db");
        std::fs::write(&restored, fx.decrypt(&archived)).unwrap();
        let item: String = Connection::open(&restored)
            .unwrap()
            .query_row("SELECT item FROM orders", [], |row| row.get(0))
            .unwrap();
        assert_eq!(item, "widget");
    }

    #[test]
    fn test_other_host_touches_nothing() {
        let mut fx = fixture();
        fx.config.host_guard = guarded("NODE-A");
        let engine = FakeEngine::serving("NODE-B");

        let outcome = BackupPipeline::new(&fx.config, &engine)
            .run(today())
            .unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Skipped(HostGuardOutcome::NotAuthoritative { .. })
        ));
        assert_eq!(
            engine.calls.borrow().as_slice(),
            ["query SELECT host FROM primary_node"]
        );
        assert!(entries(fx.staging()).is_empty());
        assert!(entries(fx.archive()).is_empty());
    }

    #[test]
    fn test_no_active_host_skips() {
        let mut fx = fixture();
        fx.config.host_guard = guarded("NODE-A");
        let engine = FakeEngine {
            active_host: None,
            ..FakeEngine::serving("unused")
        };

        let outcome = BackupPipeline::new(&fx.config, &engine)
            .run(today())
            .unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Skipped(HostGuardOutcome::NoActiveHost)
        ));
        assert_eq!(engine.calls.borrow().len(), 1);
    }

    #[test]
    fn test_rerun_same_day_leaves_one_artifact() {
        let fx = fixture();
        let engine = FakeEngine::serving("NODE-A");
        let pipeline = BackupPipeline::new(&fx.config, &engine);

        pipeline.run(today()).unwrap();
        pipeline.run(today()).unwrap();

        assert_eq!(entries(fx.archive()), ["03-04-2025.bak.encrypted"]);
        assert!(entries(fx.staging()).is_empty());
        assert_eq!(
            fx.decrypt(&fx.archive().join("03-04-2025.bak.encrypted")),
            b"dump of Sales"
        );
    }

    #[test]
    fn test_dump_failure_stops_before_encryption() {
        let fx = fixture();
        let engine = FakeEngine {
            fail_backup: true,
            ..FakeEngine::serving("NODE-A")
        };

        let err = BackupPipeline::new(&fx.config, &engine)
            .run(today())
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Dump));
        assert_eq!(err.exit_code(), Stage::Dump.exit_code());
        assert!(entries(fx.staging()).is_empty());
        assert!(entries(fx.archive()).is_empty());
    }

    #[test]
    fn test_missing_key_fails_encrypt_stage() {
        let fx = fixture();
        std::fs::remove_dir_all(fx.root.path().join("keys")).unwrap();
        let engine = FakeEngine::serving("NODE-A");

        let err = BackupPipeline::new(&fx.config, &engine)
            .run(today())
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Encrypt));
        assert_eq!(entries(fx.staging()), ["03-04-2025.bak"]);
        assert!(entries(fx.archive()).is_empty());
    }

    #[test]
    fn test_archive_failure_keeps_plaintext() {
        let mut fx = fixture();
        fx.config.archive_dir = Arc::from(fx.root.path().join("unmounted").as_path());
        let engine = FakeEngine::serving("NODE-A");

        let err = BackupPipeline::new(&fx.config, &engine)
            .run(today())
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Archive));
        assert_eq!(
            entries(fx.staging()),
            ["03-04-2025.bak", "03-04-2025.bak.encrypted"]
        );
    }

    #[test]
    fn test_retention_runs_after_archive() {
        let mut fx = fixture();
        fx.config.retention = Some(RetentionConfig::new(2, RetentionMode::Probe));
        let old = ArtifactNames::for_date(today().checked_sub_days(Days::new(2)).unwrap())
            .encrypted_in(fx.archive());
        std::fs::write(&old, b"old").unwrap();
        let engine = FakeEngine::serving("NODE-A");

        let outcome = BackupPipeline::new(&fx.config, &engine)
            .run(today())
            .unwrap();

        let RunOutcome::Completed { pruned, .. } = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(pruned.unwrap().deleted, vec![old.clone()]);
        assert!(!old.exists());
        assert_eq!(entries(fx.archive()), ["03-04-2025.bak.encrypted"]);
    }
}
