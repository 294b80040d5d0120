//! Bookkeeping for live connection handler threads.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use super::TRANSPORT_TARGET;

/// Map from peer address to the thread serving it.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConnectionRegistry {
    handlers: Arc<Mutex<HashMap<SocketAddr, JoinHandle<()>>>>,
}

impl ConnectionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Spawns a handler and records it while holding the registry lock.
    ///
    /// A handler deregisters itself on exit, which needs the same lock, so it
    /// can never remove its entry before the entry exists.
    pub(crate) fn register_with<F>(&self, peer: SocketAddr, spawn: F) -> io::Result<()>
    where
        F: FnOnce() -> io::Result<JoinHandle<()>>,
    {
        let mut handlers = self.lock();
        let handle = spawn()?;
        if handlers.insert(peer, handle).is_some() {
            warn!(
                target: TRANSPORT_TARGET,
                peer = %peer,
                "replaced stale registry entry"
            );
        }
        Ok(())
    }

    pub(crate) fn deregister(&self, peer: SocketAddr) {
        if self.lock().remove(&peer).is_some() {
            debug!(target: TRANSPORT_TARGET, peer = %peer, "connection deregistered");
        }
    }

    /// Connected peers ordered by address.
    pub(crate) fn peers(&self) -> Vec<SocketAddr> {
        let mut peers: Vec<_> = self.lock().keys().copied().collect();
        peers.sort_unstable();
        peers
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Takes every registered handle, then joins them outside the lock.
    pub(crate) fn join_all(&self) {
        let drained: Vec<_> = self.lock().drain().collect();
        for (peer, handle) in drained {
            if handle.join().is_err() {
                warn!(
                    target: TRANSPORT_TARGET,
                    peer = %peer,
                    "connection handler panicked"
                );
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SocketAddr, JoinHandle<()>>> {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
