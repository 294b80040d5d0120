//! Inbound line decoding and outbound frame encoding.

use std::io::{self, Write};

use serde::Serialize;
use tracing::{trace, warn};

use super::errors::CodecError;
use crate::transport::TRANSPORT_TARGET;

/// Terminator appended to every outbound JSON frame.
pub(crate) const FRAME_TERMINATOR: &[u8] = b"\n\0";
/// Upper bound on a single outbound socket write.
pub(crate) const CHUNK_SIZE: usize = 4096;
/// Upper bound on a buffered inbound line.
pub(crate) const MAX_LINE_BYTES: usize = 64 * 1024;

/// Splits a byte stream into trimmed, non-empty command lines.
///
/// Bytes are buffered across reads, so a line split over several TCP segments
/// is reassembled and several lines in one segment are all returned.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns every line completed by them.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, CodecError> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(line) = clean_line(&raw) {
                lines.push(line);
            }
        }

        if self.buffer.len() > MAX_LINE_BYTES {
            let size = self.buffer.len();
            self.buffer.clear();
            return Err(CodecError::LineTooLong {
                size,
                max: MAX_LINE_BYTES,
            });
        }
        Ok(lines)
    }

    /// Flushes an unterminated trailing line once the peer closes the stream.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        clean_line(&raw)
    }
}

fn clean_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Writes JSON frames terminated by [`FRAME_TERMINATOR`].
///
/// Each frame is written in chunks of at most [`CHUNK_SIZE`] bytes. A short
/// write is logged and the unwritten remainder is sent again until the whole
/// chunk has been accepted.
///
/// A failed write may leave a partial frame on the wire, so the writer
/// refuses every later frame with [`CodecError::Abandoned`].
pub(crate) struct FrameWriter<W> {
    inner: W,
    failed: bool,
}

impl<W: Write> FrameWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            inner,
            failed: false,
        }
    }

    pub(crate) fn write_frame<T>(&mut self, message: &T) -> Result<(), CodecError>
    where
        T: Serialize + ?Sized,
    {
        if self.failed {
            return Err(CodecError::Abandoned);
        }
        let mut frame = serde_json::to_vec(message)?;
        frame.extend_from_slice(FRAME_TERMINATOR);

        let result = self.write_encoded(&frame);
        self.failed = result.is_err();
        result
    }

    fn write_encoded(&mut self, frame: &[u8]) -> Result<(), CodecError> {
        let expected = frame.len();
        let mut written = 0;
        for chunk in frame.chunks(CHUNK_SIZE) {
            written = self.write_chunk(chunk, written, expected)?;
        }
        self.inner.flush()?;
        trace!(target: TRANSPORT_TARGET, bytes = expected, "frame written");
        Ok(())
    }

    fn write_chunk(
        &mut self,
        chunk: &[u8],
        mut written: usize,
        expected: usize,
    ) -> Result<usize, CodecError> {
        let mut remaining = chunk;
        while !remaining.is_empty() {
            match self.inner.write(remaining) {
                Ok(0) => return Err(CodecError::WriteZero { written, expected }),
                Ok(count) => {
                    if count < remaining.len() {
                        warn!(
                            target: TRANSPORT_TARGET,
                            sent = count,
                            requested = remaining.len(),
                            "short socket write, resending remainder"
                        );
                    }
                    written += count;
                    remaining = &remaining[count..];
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            }
        }
        Ok(written)
    }

    #[cfg(test)]
    pub(crate) fn get_ref(&self) -> &W {
        &self.inner
    }
}
