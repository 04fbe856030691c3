use crate::backup::arcvec::ArcVec;
use crate::backup::encrypt::{Encryptor, EncryptorBuilder};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::validate_files_exist;
use age::armor::{ArmoredWriter, Format};
use age::x25519;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use validator::Validate;

fn default_armor() -> bool {
    true
}

/// Configuration for age public-key encryption
///
/// Each file in `recipient_files` holds exactly one age X25519 public key
/// (`age1...`). The backup is encrypted once with a random file key, and that
/// file key is wrapped for every recipient, so any single matching identity
/// can decrypt it.
#[derive(Clone, Deserialize, Serialize, Debug, Validate, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
pub struct AgeEncryptorConfig {
    #[validate(length(min = 1), custom(function = validate_files_exist))]
    #[getset(get = "pub")]
    recipient_files: ArcVec<Arc<Path>>,

    /// Wrap the ciphertext in age ASCII armor
    #[serde(default = "default_armor")]
    #[getset(get_copy = "pub")]
    armor: bool,
}

impl AgeEncryptorConfig {
    pub fn new(recipient_files: ArcVec<Arc<Path>>, armor: bool) -> Self {
        Self {
            recipient_files,
            armor,
        }
    }

    pub fn load_recipients(&self) -> Result<RecipientSet> {
        let recipients = self
            .recipient_files
            .iter()
            .map(load_recipient)
            .collect::<Result<Vec<_>>>()?;

        Ok(RecipientSet {
            recipients,
            armor: self.armor,
        })
    }
}

/// Recipients read from their key files, ready to build an encryptor.
pub struct RecipientSet {
    recipients: Vec<x25519::Recipient>,
    armor: bool,
}

impl RecipientSet {
    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

/// Reads the single public key in an age recipients file.
///
/// Blank lines and `#` comments are skipped. A file with no key, or with more
/// than one, is rejected rather than picking one of them.
pub fn load_recipient<P: AsRef<Path>>(path: P) -> Result<x25519::Recipient> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(Error::from)
        .with_msg(format!("Read recipient key file {:?} failed", path))?;

    let keys = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect_vec();

    match keys.as_slice() {
        [] => Err(Error::key_file(path, "no public key found")),
        [key] => key
            .parse::<x25519::Recipient>()
            .map_err(|e| Error::key_file(path, e.to_string())),
        _ => Err(Error::key_file(
            path,
            format!("expected exactly one public key, found {}", keys.len()),
        )),
    }
}

impl<W: Write> EncryptorBuilder<W> for RecipientSet {
    fn build_encryptor(&self, writer: W) -> Result<Encryptor<W>> {
        let encryptor = age::Encryptor::with_recipients(
            self.recipients.iter().map(|r| r as &dyn age::Recipient),
        )?;

        if self.armor {
            tracing::debug!("Initializing armored age encryption");
            let armored = ArmoredWriter::wrap_output(writer, Format::AsciiArmor)?;
            Ok(Encryptor::Armored(encryptor.wrap_output(armored)?))
        } else {
            tracing::debug!("Initializing binary age encryption");
            Ok(Encryptor::Binary(encryptor.wrap_output(writer)?))
        }
    }
}
