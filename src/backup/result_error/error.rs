use crate::backup::result_error::stage::{Stage, UNCLASSIFIED_EXIT_CODE};
use crate::backup::result_error::{InStage, WithDebugObjectAndFnName, WithMsg};
use itertools::Itertools;
use std::fmt::Debug;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    LiblzmaStream(#[from] liblzma::stream::Error),
    #[error(transparent)]
    AgeEncrypt(#[from] age::EncryptError),
    #[error(transparent)]
    AgeDecrypt(#[from] age::DecryptError),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error("Invalid key file {path:?}: {reason}")]
    KeyFile { path: PathBuf, reason: String },
    #[error("Command {program:?} failed with {status}:\n{}", indent::indent_all_with("  ", stderr))]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Database dump reported success but {0:?} does not exist")]
    DumpMissing(PathBuf),
    #[error("Local hostname is not valid unicode: {0:?}")]
    InvalidHostname(String),
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{:?} {} failed:\n{}", obj_debug, fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send>,
        fn_name: String,
    },
    #[error("Stage {} failed:\n{}", stage, indent::indent_all_with("  ", error.to_string()))]
    InStage { stage: Stage, error: Box<Error> },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>, O: Debug + Send + 'static> WithDebugObjectAndFnName<S, O> for Error {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl InStage for Error {
    fn in_stage(self, stage: Stage) -> Self {
        Self::InStage {
            stage,
            error: Box::new(self),
        }
    }
}

impl Error {
    pub fn key_file<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::KeyFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(|e| e.into_iter())),
            e => Box::new(std::iter::once(e)),
        }
    }

    pub fn chain(self, other: Error) -> Error {
        Error::LotsOfError(self.into_iter().chain(other.into_iter()).collect_vec())
    }

    /// Outermost stage tag found in this error, looking through context wrappers.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::InStage { stage, .. } => Some(*stage),
            Error::WithMsg { error, .. } | Error::WithDebugObjAndFnName { error, .. } => {
                error.stage()
            }
            Error::LotsOfError(errors) => errors.iter().find_map(Error::stage),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.stage()
            .map(|s| s.exit_code())
            .unwrap_or(UNCLASSIFIED_EXIT_CODE)
    }
}
