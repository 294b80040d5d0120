//! Error types for the wire codec.

use std::io;

use thiserror::Error;

/// Errors raised while decoding command lines or writing frames.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("command line of {size} bytes exceeds the {max} byte limit")]
    LineTooLong { size: usize, max: usize },
    #[error("failed to serialise frame: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("socket accepted zero bytes after {written} of {expected} frame bytes")]
    WriteZero { written: usize, expected: usize },
    #[error("connection abandoned after an earlier write failure")]
    Abandoned,
    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),
}
