use derive_more::Display;

/// Pipeline stage a fatal error originated from.
///
/// Each stage maps to its own process exit code so the scheduler (and the
/// operator reading its history) can tell which part of the run failed
/// without parsing log output.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    #[display("configuration")]
    Config,
    #[display("host guard")]
    HostGuard,
    #[display("database dump")]
    Dump,
    #[display("encryption")]
    Encrypt,
    #[display("archive")]
    Archive,
}

impl Stage {
    pub fn exit_code(&self) -> i32 {
        match self {
            Stage::Config => 2,
            Stage::HostGuard => 3,
            Stage::Dump => 4,
            Stage::Encrypt => 5,
            Stage::Archive => 6,
        }
    }
}

/// Exit code used when an error carries no stage.
pub const UNCLASSIFIED_EXIT_CODE: i32 = 1;
