pub mod age;

use crate::backup::compress::{CompressorBuilder, CompressorConfig};
use crate::backup::encrypt::age::{AgeEncryptorConfig, RecipientSet};
use crate::backup::finish::Finish;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use ::age::armor::ArmoredWriter;
use ::age::stream::StreamWriter;
use derive_more::From;
use io_enum::Write;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::path::Path;
use std::result;
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

#[derive(Write)]
pub enum Encryptor<W: io::Write> {
    Armored(StreamWriter<ArmoredWriter<W>>),
    Binary(StreamWriter<W>),
}

#[derive(Clone, From, Serialize, Deserialize, Debug)]
#[serde(tag = "encryptor_type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum EncryptorConfig {
    Age(AgeEncryptorConfig),
}

impl Validate for EncryptorConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            EncryptorConfig::Age(inner) => inner.validate(),
        }
    }
}

pub trait EncryptorBuilder<W: io::Write> {
    fn build_encryptor(&self, writer: W) -> Result<Encryptor<W>>;
}

impl<W: io::Write> Finish<W> for Encryptor<W> {
    fn finish(self) -> result::Result<W, io::Error> {
        match self {
            Encryptor::Armored(w) => Finish::finish(w).and_then(Finish::finish),
            Encryptor::Binary(w) => Finish::finish(w),
        }
    }
}

impl EncryptorConfig {
    /// Reads every recipient key file, failing on the first unusable one.
    pub fn load_recipients(&self) -> Result<RecipientSet> {
        match self {
            EncryptorConfig::Age(age) => age.load_recipients(),
        }
        .with_debug_object_and_fn_name(self.clone(), "load_recipients")
    }
}

/// Compresses `plaintext` and encrypts it for every configured recipient into `output`.
///
/// All key files are read before `output` is created, so a missing or malformed
/// key never leaves a ciphertext behind. A partially written `output` is
/// removed on failure. `plaintext` is only ever read.
///
/// Returns the number of plaintext bytes consumed.
pub fn encrypt_file(
    plaintext: &Path,
    output: &Path,
    encryptor: &EncryptorConfig,
    compressor: &CompressorConfig,
) -> Result<u64> {
    let recipients = encryptor.load_recipients()?;
    info!(
        "Encrypting {:?} for {} recipient(s) into {:?}",
        plaintext,
        recipients.len(),
        output
    );

    let mut input = File::open(plaintext)
        .map_err(Error::from)
        .with_msg(format!("Open plaintext {:?} failed", plaintext))?;
    let output_file = File::create(output)
        .map_err(Error::from)
        .with_msg(format!("Create ciphertext {:?} failed", output))?;

    write_encrypted(&mut input, output_file, &recipients, compressor).map_err(|mut e| {
        warn!("Encryption failed, removing partial output {:?}", output);
        if let Err(e2) = std::fs::remove_file(output) {
            e = e.chain(e2.into())
        }
        e.with_msg(format!("Encrypt {:?} failed", plaintext))
    })
}

fn write_encrypted(
    input: &mut File,
    output: File,
    recipients: &RecipientSet,
    compressor: &CompressorConfig,
) -> Result<u64> {
    let mut writer = recipients
        .build_encryptor(BufWriter::new(output))
        .map(BufWriter::new)
        .and_then(|w| compressor.build_compressor(w))?;

    let copied = io::copy(input, &mut writer)?;

    writer
        .finish()?
        .finish()?
        .finish()?
        .finish()?
        .sync_all()?;

    Ok(copied)
}
