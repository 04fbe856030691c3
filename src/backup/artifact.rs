//! Date-stamped backup artifact names.
//!
//! A run on a given calendar date produces `MM-DD-YYYY.bak` (plaintext, staging
//! only) and `MM-DD-YYYY.bak.encrypted` (staging, then archive). The retention
//! pruner recomputes these names from dates, so both directions live here.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

static DATE_FORMAT: &str = "%m-%d-%Y";
pub static PLAINTEXT_EXT: &str = "bak";
pub static ENCRYPTED_EXT: &str = "encrypted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub date: NaiveDate,
    pub plaintext: String,
    pub encrypted: String,
}

impl ArtifactNames {
    pub fn for_date(date: NaiveDate) -> Self {
        let plaintext = format!("{}.{}", date.format(DATE_FORMAT), PLAINTEXT_EXT);
        let encrypted = format!("{}.{}", plaintext, ENCRYPTED_EXT);
        Self {
            date,
            plaintext,
            encrypted,
        }
    }

    pub fn plaintext_in<P: AsRef<Path>>(&self, dir: P) -> PathBuf {
        dir.as_ref().join(&self.plaintext)
    }

    pub fn encrypted_in<P: AsRef<Path>>(&self, dir: P) -> PathBuf {
        dir.as_ref().join(&self.encrypted)
    }
}

/// Decodes the backup date from an encrypted artifact path.
///
/// Only exact `MM-DD-YYYY.bak.encrypted` names match; anything else (temporary
/// files, plaintext dumps, foreign files) yields `None`.
pub fn date_from_encrypted_path<P: AsRef<Path>>(path: P) -> Option<NaiveDate> {
    let file_name = path.as_ref().file_name()?.to_str()?;
    let end = format!(".{}.{}", PLAINTEXT_EXT, ENCRYPTED_EXT);
    let date_str = file_name.strip_suffix(end.as_str())?;

    // chrono accepts unpadded fields; the naming convention does not.
    if date_str.len() != 10 {
        return None;
    }

    let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).ok()?;
    (ArtifactNames::for_date(date).encrypted == file_name).then_some(date)
}
