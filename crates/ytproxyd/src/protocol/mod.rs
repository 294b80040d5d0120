//! Line protocol spoken with proxy clients.
//!
//! Inbound traffic is plain text, one command per line, with `?` separating
//! the fields of admission commands (`getStopInfo?id=42?<url>`). Outbound
//! traffic is JSON, one message per frame, each frame terminated by `\n\0`
//! and written in fixed-size chunks.
//!
//! Commands are decoded once at the boundary into [`Command`]; everything
//! past the connection handler works with typed values.

mod codec;
mod command;
mod errors;
mod response;

pub(crate) use self::codec::{FrameWriter, LineDecoder};
#[cfg(test)]
pub(crate) use self::codec::{FRAME_TERMINATOR, MAX_LINE_BYTES};
pub(crate) use self::command::{Command, QueryRequest};
pub use self::command::QueryKind;
pub(crate) use self::errors::CodecError;
pub(crate) use self::response::{PeerEntry, QueueEntry, Reply, Response};
#[cfg(test)]
pub(crate) use self::response::ReplyStatus;
pub use self::response::{ResultCode, ResultEnvelope};
