use age::armor::ArmoredWriter;
use age::stream::StreamWriter;
use std::io::{BufWriter, Error, IntoInnerError, Write};

/// Flushes trailing frames of a layered writer and hands back the inner writer.
///
/// Dropping a compressor or an age stream without finishing it silently
/// truncates the output, so every layer of the encryption pipeline goes
/// through this trait.
pub trait Finish<O> {
    fn finish(self) -> Result<O, Error>;
}

impl<W: Write> Finish<W> for StreamWriter<W> {
    fn finish(self) -> Result<W, Error> {
        self.finish()
    }
}

impl<W: Write> Finish<W> for ArmoredWriter<W> {
    fn finish(self) -> Result<W, Error> {
        self.finish()
    }
}

impl<W: Write> Finish<W> for BufWriter<W> {
    fn finish(self) -> Result<W, Error> {
        self.into_inner().map_err(IntoInnerError::into_error)
    }
}
