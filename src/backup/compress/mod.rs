pub mod gzip;
pub mod xz;

use crate::backup::finish::Finish;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use derive_more::From;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use io_enum::{Read, Write};
use liblzma::read::XzDecoder;
use liblzma::write::XzEncoder;
use serde::{Deserialize, Serialize};
use std::io;
use std::result;
use validator::{Validate, ValidationErrors};

#[derive(Write, From)]
pub enum Compressor<W: io::Write> {
    XzEncoder(XzEncoder<W>),
    GzEncoder(GzEncoder<W>),
}

#[derive(Read, From)]
pub enum Decompressor<R: io::Read> {
    XzDecoder(XzDecoder<R>),
    GzDecoder(GzDecoder<R>),
}

#[derive(Clone, From, Serialize, Deserialize, Debug)]
#[serde(tag = "compressor_type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum CompressorConfig {
    Xz(xz::XzConfig),
    Gzip(gzip::GzipConfig),
}

impl Default for CompressorConfig {
    fn default() -> Self {
        CompressorConfig::Xz(xz::XzConfig::default())
    }
}

impl Validate for CompressorConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            CompressorConfig::Xz(xz) => xz.validate(),
            CompressorConfig::Gzip(gzip) => gzip.validate(),
        }
    }
}

pub trait CompressorBuilder<W: io::Write> {
    fn build_compressor(&self, writer: W) -> Result<Compressor<W>>;
}

impl<W: io::Write> Finish<W> for Compressor<W> {
    fn finish(self) -> io::Result<W> {
        match self {
            Compressor::XzEncoder(w) => w.finish(),
            Compressor::GzEncoder(w) => w.finish(),
        }
    }
}

impl<W: io::Write> CompressorBuilder<W> for CompressorConfig {
    fn build_compressor(&self, writer: W) -> Result<Compressor<W>> {
        match self {
            CompressorConfig::Xz(xz) => xz.build_compressor(writer),
            CompressorConfig::Gzip(gzip) => gzip.build_compressor(writer),
        }
        .with_debug_object_and_fn_name(self.clone(), "build_compressor")
    }
}

impl CompressorConfig {
    pub fn build_decompressor<R: io::Read>(&self, reader: R) -> Decompressor<R> {
        match self {
            CompressorConfig::Xz(_) => XzDecoder::new(reader).into(),
            CompressorConfig::Gzip(_) => GzDecoder::new(reader).into(),
        }
    }
}
