//! Handler doubles for acceptor tests.

use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};

use super::ConnectionHandler;

/// Records the peer of every connection it is handed, then drops the socket.
#[derive(Debug, Default)]
pub(crate) struct PeerRecorder {
    peers: Mutex<Vec<SocketAddr>>,
}

impl PeerRecorder {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn seen(&self) -> usize {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ConnectionHandler for PeerRecorder {
    fn handle(&self, _stream: TcpStream, peer: SocketAddr) {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(peer);
    }
}
