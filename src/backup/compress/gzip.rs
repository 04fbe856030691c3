use crate::backup::compress::{Compressor, CompressorBuilder};
use crate::backup::result_error::result::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::io::Write;
use validator::Validate;

/// Configuration for gzip (deflate) compression
///
/// Cheaper on CPU than xz, and readable by any `gunzip` after decryption.
#[skip_serializing_none]
#[derive(Clone, Default, Validate, Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct GzipConfig {
    /// Compression level (0-9), flate2's default when unset
    #[validate(range(min = 0, max = 9))]
    level: Option<u32>,
}

impl GzipConfig {
    pub fn new(level: Option<u32>) -> Self {
        Self { level }
    }
}

impl<W: Write> CompressorBuilder<W> for GzipConfig {
    fn build_compressor(&self, writer: W) -> Result<Compressor<W>> {
        let compression = self.level.map(Compression::new).unwrap_or_default();
        tracing::debug!("Creating gzip compressor with level={}", compression.level());
        Ok(GzEncoder::new(writer, compression).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_level_validation() {
        assert!(GzipConfig::new(Some(9)).validate().is_ok());
        assert!(GzipConfig::new(Some(10)).validate().is_err());
    }

    #[test]
    fn test_build_compressor() {
        let compressor = GzipConfig::default().build_compressor(Vec::new()).unwrap();
        assert!(matches!(compressor, Compressor::GzEncoder(_)));
    }
}
