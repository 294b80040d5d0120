//! Per-connection read loop.

use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ResponseSink, TRANSPORT_TARGET};
use crate::admission::Admission;
use crate::process::ShutdownToken;
use crate::protocol::{CodecError, Command, LineDecoder};

const READ_BUFFER_BYTES: usize = 4096;

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Serves a single connection until the peer leaves or shutdown begins.
    /// Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream, peer: SocketAddr);
}

/// Handler speaking the proxy line protocol.
#[derive(Debug, Clone)]
pub(crate) struct QueryConnectionHandler {
    admission: Admission,
    shutdown: ShutdownToken,
    read_timeout: Duration,
}

/// Whether the connection can keep serving after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

impl QueryConnectionHandler {
    pub(crate) fn new(admission: Admission, shutdown: ShutdownToken, read_timeout: Duration) -> Self {
        Self {
            admission,
            shutdown,
            read_timeout,
        }
    }

    fn serve(&self, stream: &TcpStream, peer: SocketAddr) -> Result<(), CodecError> {
        stream.set_read_timeout(Some(self.read_timeout))?;
        // Bounds how long a client that stops reading can hold its writer.
        stream.set_write_timeout(Some(self.read_timeout))?;
        let sink = ResponseSink::new(peer, stream.try_clone()?);
        let mut decoder = LineDecoder::new();
        let mut reader = stream;
        let mut buffer = [0_u8; READ_BUFFER_BYTES];

        while !self.shutdown.is_triggered() {
            match reader.read(&mut buffer) {
                Ok(0) => {
                    if let Some(line) = decoder.finish() {
                        self.respond(&line, &sink);
                    }
                    debug!(target: TRANSPORT_TARGET, peer = %peer, "peer closed connection");
                    return Ok(());
                }
                Ok(count) => {
                    for line in decoder.feed(&buffer[..count])? {
                        if self.respond(&line, &sink) == Flow::Close {
                            debug!(
                                target: TRANSPORT_TARGET,
                                peer = %peer,
                                "closing connection after failed reply"
                            );
                            return Ok(());
                        }
                    }
                }
                Err(error) if is_retryable(&error) => {}
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }

    /// Answers one line. The writer stays held while the command is
    /// admitted, so the acknowledgement precedes any result for it.
    fn respond(&self, line: &str, sink: &ResponseSink) -> Flow {
        debug!(target: TRANSPORT_TARGET, peer = %sink.peer(), line, "command received");
        if sink.reply_with(|| self.admission.handle(Command::parse(line), sink)) {
            Flow::Continue
        } else {
            Flow::Close
        }
    }
}

impl ConnectionHandler for QueryConnectionHandler {
    fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        info!(target: TRANSPORT_TARGET, peer = %peer, "connection accepted");
        if let Err(error) = self.serve(&stream, peer) {
            warn!(
                target: TRANSPORT_TARGET,
                peer = %peer,
                error = %error,
                "connection handler error"
            );
        }
        if let Err(error) = stream.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            debug!(
                target: TRANSPORT_TARGET,
                peer = %peer,
                error = %error,
                "socket shutdown failed"
            );
        }
        info!(target: TRANSPORT_TARGET, peer = %peer, "connection terminated");
    }
}

fn is_retryable(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
