//! TCP transport for proxy clients.
//!
//! The acceptor binds the configured endpoint, polls for connections in a
//! background thread and hands each one to a [`ConnectionHandler`] running on
//! its own thread. Handler threads are tracked in a [`ConnectionRegistry`] so
//! shutdown can join them and clients can list connected peers.

mod errors;
mod handler;
mod listener;
mod registry;
mod sink;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, QueryConnectionHandler};
pub(crate) use self::listener::{AcceptContext, AcceptorExit, ListenerHandle, SocketListener};
pub(crate) use self::registry::ConnectionRegistry;
pub(crate) use self::sink::ResponseSink;
#[cfg(test)]
pub(crate) use self::test_utils::PeerRecorder;

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
