//! Shared helpers for unit tests.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::protocol::{FRAME_TERMINATOR, QueryKind, QueryRequest};
use crate::transport::ResponseSink;

/// In-memory writer whose clones share one buffer.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub(crate) fn contents(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Decodes every complete frame written so far.
    pub(crate) fn json_frames(&self) -> Vec<Value> {
        frames(&self.contents())
            .iter()
            .map(|frame| serde_json::from_slice(frame).expect("frame is JSON"))
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub(crate) fn test_peer() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40_000))
}

pub(crate) fn request(kind: QueryKind, id: &str, body: &str) -> QueryRequest {
    QueryRequest {
        kind,
        id: id.to_owned(),
        body: body.to_owned(),
    }
}

pub(crate) fn discard_sink() -> ResponseSink {
    ResponseSink::new(test_peer(), io::sink())
}

pub(crate) fn buffer_sink() -> (ResponseSink, SharedBuffer) {
    let buffer = SharedBuffer::default();
    (ResponseSink::new(test_peer(), buffer.clone()), buffer)
}

/// Splits a byte stream on frame terminators, dropping any partial tail.
pub(crate) fn frames(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut rest = bytes;
    while let Some(end) = rest
        .windows(FRAME_TERMINATOR.len())
        .position(|window| window == FRAME_TERMINATOR)
    {
        frames.push(rest[..end].to_vec());
        rest = &rest[end + FRAME_TERMINATOR.len()..];
    }
    frames
}

/// Reads one frame from a blocking stream, without its terminator.
pub(crate) fn read_frame(reader: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut frame = Vec::new();
    let mut byte = [0_u8; 1];
    while !frame.ends_with(FRAME_TERMINATOR) {
        if reader.read(&mut byte)? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        frame.push(byte[0]);
    }
    frame.truncate(frame.len() - FRAME_TERMINATOR.len());
    Ok(frame)
}
