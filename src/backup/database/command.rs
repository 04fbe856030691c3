use crate::backup::arcvec::ArcVec;
use crate::backup::database::{first_host_line, DatabaseEngine};
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use bon::Builder;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

/// Environment variable the connection string is handed to the dump tool in
pub static CONNECTION_ENV: &str = "DB_BACKUP_CONNECTION";

static DATABASE_PLACEHOLDER: &str = "{database}";
static OUTPUT_PLACEHOLDER: &str = "{output}";

/// Backup through an external dump tool
///
/// `backup_command` is the argv of the tool. `{database}` and `{output}` are
/// substituted in every argument. The connection string never appears on the
/// command line; the child reads it from `DB_BACKUP_CONNECTION`.
///
/// The active host query is run through the platform shell and its first
/// non-empty stdout line is the host name.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct CommandDatabaseConfig {
    #[validate(length(min = 1))]
    #[builder(into)]
    backup_command: ArcVec<Arc<str>>,
    #[validate(nested)]
    connection: Option<RedactedString>,
}

impl CommandDatabaseConfig {
    fn backup_argv(&self, database: &str, output: &Path) -> Vec<OsString> {
        self.backup_command
            .iter()
            .map(|arg| {
                if **arg == *OUTPUT_PLACEHOLDER {
                    output.as_os_str().to_os_string()
                } else {
                    arg.replace(DATABASE_PLACEHOLDER, database)
                        .replace(OUTPUT_PLACEHOLDER, &output.to_string_lossy())
                        .into()
                }
            })
            .collect()
    }

    fn run(&self, argv: Vec<OsString>) -> Result<Output> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .ok_or_else(|| std::io::Error::other("empty command"))?;
        let program_name = program.to_string_lossy().into_owned();

        let mut command = Command::new(&program);
        command.args(argv).stdin(Stdio::null());
        if let Some(connection) = &self.connection {
            command.env(CONNECTION_ENV, connection.inner());
        }

        debug!("Running {:?}", program_name);
        let output = command
            .output()
            .map_err(Error::from)
            .with_msg(format!("Spawn {:?} failed", program_name))?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                program: program_name,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

#[cfg(windows)]
fn shell_argv(line: &str) -> Vec<OsString> {
    vec!["cmd".into(), "/C".into(), line.into()]
}

#[cfg(not(windows))]
fn shell_argv(line: &str) -> Vec<OsString> {
    vec!["sh".into(), "-c".into(), line.into()]
}

impl DatabaseEngine for CommandDatabaseConfig {
    fn query_active_host(&self, query: &str) -> Result<Option<String>> {
        let output = self.run(shell_argv(query))?;
        Ok(first_host_line(&String::from_utf8_lossy(&output.stdout)))
    }

    fn backup_to(&self, database: &str, output: &Path) -> Result<()> {
        self.run(self.backup_argv(database, output)).map(|_| ())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(argv: &[&str]) -> CommandDatabaseConfig {
        CommandDatabaseConfig::builder()
            .backup_command(argv.iter().map(|a| Arc::from(*a)).collect::<Vec<Arc<str>>>())
            .build()
    }

    #[test]
    fn test_backup_argv_substitution() {
        let config = config(&["sqlcmd", "-Q", "BACKUP DATABASE {database} TO DISK='{output}'", "{output}"]);
        let argv = config.backup_argv("Sales", Path::new("/staging/01-01-2025.bak"));

        assert_eq!(
            argv,
            vec![
                OsString::from("sqlcmd"),
                "-Q".into(),
                "BACKUP DATABASE Sales TO DISK='/staging/01-01-2025.bak'".into(),
                "/staging/01-01-2025.bak".into(),
            ]
        );
    }

    #[test]
    fn test_backup_runs_command() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("01-01-2025.bak");
        let config = config(&["sh", "-c", "printf 'dump of %s' \"$0\" > \"$1\"", "{database}", "{output}"]);

        config.backup_to("Sales", &output).unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "dump of Sales");
    }

    #[test]
    fn test_connection_passed_through_env() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("conn.bak");
        let config = CommandDatabaseConfig::builder()
            .backup_command(vec![
                Arc::<str>::from("sh"),
                "-c".into(),
                "printf %s \"$DB_BACKUP_CONNECTION\" > \"$0\"".into(),
                "{output}".into(),
            ])
            .connection(RedactedString::builder().inner("Server=db;Password=x").build())
            .build();

        config.backup_to("Sales", &output).unwrap();

        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "Server=db;Password=x"
        );
        assert!(!format!("{:?}", config).contains("Password=x"));
    }

    #[test]
    fn test_failed_command_reports_stderr() {
        let config = config(&["sh", "-c", "echo 'backup device full' >&2; exit 3"]);

        let err = config
            .backup_to("Sales", Path::new("/nonexistent/x.bak"))
            .unwrap_err();

        match err {
            Error::CommandFailed { stderr, status, .. } => {
                assert_eq!(stderr, "backup device full");
                assert_eq!(status.code(), Some(3));
            }
            e => panic!("Expected CommandFailed, got {e}"),
        }
    }

    #[test]
    fn test_missing_program_fails() {
        let config = config(&["/definitely/not/a/dump-tool"]);
        assert!(config.backup_to("Sales", Path::new("/tmp/x.bak")).is_err());
    }

    #[test]
    fn test_query_active_host_via_shell() {
        let config = config(&["true"]);
        assert_eq!(
            config.query_active_host("printf '\\nNODE-B\\n'").unwrap(),
            Some("NODE-B".to_string())
        );
        assert_eq!(config.query_active_host("true").unwrap(), None);
        assert!(config.query_active_host("exit 1").is_err());
    }

    #[test]
    fn test_validation_requires_command() {
        assert!(config(&[]).validate().is_err());
        assert!(config(&["pg_dump"]).validate().is_ok());
    }
}
