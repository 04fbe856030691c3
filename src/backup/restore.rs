//! Manual recovery of archived artifacts.
//!
//! Reverses the encryption stage: age-decrypt (armored or binary) with an
//! X25519 identity, then decompress.

use crate::backup::compress::CompressorConfig;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use age::armor::ArmoredReader;
use age::x25519;
use itertools::Itertools;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Reads every `AGE-SECRET-KEY-` line of an age identity file.
pub fn load_identities<P: AsRef<Path>>(path: P) -> Result<Vec<x25519::Identity>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(Error::from)
        .with_msg(format!("Read identity file {:?} failed", path))?;

    let identities = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.parse::<x25519::Identity>()
                .map_err(|e| Error::key_file(path, e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    if identities.is_empty() {
        return Err(Error::key_file(path, "no identity found"));
    }
    Ok(identities)
}

pub fn decrypt_artifact<R: BufRead, W: Write>(
    input: R,
    identities: &[x25519::Identity],
    compressor: &CompressorConfig,
    output: &mut W,
) -> Result<u64> {
    let decryptor = age::Decryptor::new(ArmoredReader::new(input))?;
    let reader = decryptor.decrypt(identities.iter().map(|i| i as &dyn age::Identity))?;
    let mut decompressed = compressor.build_decompressor(reader);
    Ok(std::io::copy(&mut decompressed, output)?)
}

/// Decrypts `input` into a new file at `output`.
///
/// `output` must not exist yet; a failed restore removes what it wrote.
pub fn restore_file(
    input: &Path,
    identity_files: &[impl AsRef<Path>],
    compressor: &CompressorConfig,
    output: &Path,
) -> Result<u64> {
    let identities: Vec<_> = identity_files
        .iter()
        .map(load_identities)
        .flatten_ok()
        .collect::<Result<_>>()?;

    let reader = File::open(input)
        .map(BufReader::new)
        .map_err(Error::from)
        .with_msg(format!("Open artifact {:?} failed", input))?;
    let mut writer = File::create_new(output)
        .map(BufWriter::new)
        .map_err(Error::from)
        .with_msg(format!("Create restore target {:?} failed", output))?;

    let res = decrypt_artifact(reader, &identities, compressor, &mut writer)
        .and_then(|n| writer.flush().map(|_| n).map_err(Error::from));

    match res {
        Ok(n) => {
            info!("Restored {} bytes from {:?} into {:?}", n, input, output);
            Ok(n)
        }
        Err(mut e) => {
            drop(writer);
            if let Err(e2) = std::fs::remove_file(output) {
                e = e.chain(e2.into())
            }
            Err(e.with_msg(format!("Restore {:?} failed", input)))
        }
    }
}
