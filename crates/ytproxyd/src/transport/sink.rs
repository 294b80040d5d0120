//! Per-connection outbound channel shared by the handler and the executor.

use std::fmt;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::warn;

use super::TRANSPORT_TARGET;
use crate::protocol::{CodecError, FrameWriter};

type BoxedWriter = FrameWriter<Box<dyn Write + Send>>;
type SharedWriter = Arc<Mutex<BoxedWriter>>;

/// Writes framed messages to one client.
///
/// Clones share the same writer; the mutex keeps acknowledgements from the
/// handler and results from the executor from interleaving mid-frame.
#[derive(Clone)]
pub(crate) struct ResponseSink {
    peer: SocketAddr,
    writer: SharedWriter,
}

impl ResponseSink {
    pub(crate) fn new(peer: SocketAddr, writer: impl Write + Send + 'static) -> Self {
        Self {
            peer,
            writer: Arc::new(Mutex::new(FrameWriter::new(Box::new(writer)))),
        }
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub(crate) fn send<T>(&self, message: &T) -> Result<(), CodecError>
    where
        T: Serialize + ?Sized,
    {
        self.lock().write_frame(message)
    }

    /// Sends `message`, logging instead of propagating failures.
    ///
    /// Returns false when the write failed. Write errors are never retried.
    pub(crate) fn deliver<T>(&self, message: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        self.report(self.send(message))
    }

    /// Builds a reply with the writer held and sends it before releasing it.
    ///
    /// Anything `produce` hands to another thread for this client, such as an
    /// admitted query, cannot reach the wire ahead of the reply.
    pub(crate) fn reply_with<T>(&self, produce: impl FnOnce() -> T) -> bool
    where
        T: Serialize,
    {
        let mut writer = self.lock();
        let reply = produce();
        let result = writer.write_frame(&reply);
        drop(writer);
        self.report(result)
    }

    fn lock(&self) -> MutexGuard<'_, BoxedWriter> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, result: Result<(), CodecError>) -> bool {
        match result {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    target: TRANSPORT_TARGET,
                    peer = %self.peer,
                    error = %error,
                    "failed to write response"
                );
                false
            }
        }
    }
}

impl fmt::Debug for ResponseSink {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ResponseSink")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}
