//! Acceptor thread for the TCP endpoint.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use ytproxy_config::ListenEndpoint;

use super::{ConnectionHandler, ConnectionRegistry, ListenerError, TRANSPORT_TARGET};
use crate::executor::ExecutorLiveness;
use crate::process::ShutdownToken;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to the configured endpoint.
#[derive(Debug)]
pub(crate) struct SocketListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

/// Shared state the accept loop works with.
pub(crate) struct AcceptContext {
    pub(crate) registry: ConnectionRegistry,
    pub(crate) shutdown: ShutdownToken,
    /// Executor to supervise; losing it stops the server.
    pub(crate) executor: Option<ExecutorLiveness>,
}

/// Why the accept loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcceptorExit {
    Shutdown,
    ExecutorLost,
}

impl SocketListener {
    pub(crate) fn bind(endpoint: &ListenEndpoint) -> Result<Self, ListenerError> {
        let listener = bind_tcp(&endpoint.host, endpoint.port)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        context: AcceptContext,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let handle = thread::Builder::new()
            .name("ytproxyd-acceptor".to_owned())
            .spawn(move || run_accept_loop(self, handler, context))
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            handle: Some(handle),
        })
    }
}

/// Handle to the background acceptor thread.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    handle: Option<thread::JoinHandle<AcceptorExit>>,
}

impl ListenerHandle {
    /// Waits for the acceptor, which in turn has joined every handler.
    pub(crate) fn join(mut self) -> Result<AcceptorExit, ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(AcceptorExit::Shutdown),
        }
    }
}

fn run_accept_loop(
    listener: SocketListener,
    handler: Arc<dyn ConnectionHandler>,
    context: AcceptContext,
) -> AcceptorExit {
    info!(
        target: TRANSPORT_TARGET,
        endpoint = %listener.local_addr,
        "socket listener active"
    );
    let AcceptContext {
        registry,
        shutdown,
        executor,
    } = context;

    let mut exit = AcceptorExit::Shutdown;
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.is_triggered() {
        if let Some(executor) = &executor
            && !executor.is_alive()
        {
            error!(
                target: TRANSPORT_TARGET,
                "executor stopped unexpectedly; shutting down"
            );
            exit = AcceptorExit::ExecutorLost;
            shutdown.trigger();
            break;
        }

        match accept_connection(&listener.listener) {
            Ok(Some((stream, peer))) => {
                last_error = None;
                spawn_handler(&registry, &handler, stream, peer);
            }
            Ok(None) => {
                shutdown.wait_timeout(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: TRANSPORT_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                shutdown.wait_timeout(ERROR_BACKOFF);
            }
        }
    }

    drop(listener);
    info!(
        target: TRANSPORT_TARGET,
        connections = registry.len(),
        "listener closed; joining connection handlers"
    );
    registry.join_all();
    exit
}

fn spawn_handler(
    registry: &ConnectionRegistry,
    handler: &Arc<dyn ConnectionHandler>,
    stream: TcpStream,
    peer: SocketAddr,
) {
    let handler = Arc::clone(handler);
    let deregister = registry.clone();
    let spawned = registry.register_with(peer, move || {
        thread::Builder::new()
            .name(format!("ytproxyd-conn-{peer}"))
            .spawn(move || {
                handler.handle(stream, peer);
                deregister.deregister(peer);
            })
    });
    if let Err(error) = spawned {
        warn!(
            target: TRANSPORT_TARGET,
            peer = %peer,
            error = %error,
            "failed to spawn connection handler"
        );
    }
}

fn accept_connection(listener: &TcpListener) -> Result<Option<(TcpStream, SocketAddr)>, io::Error> {
    match listener.accept() {
        Ok((stream, peer)) => {
            stream.set_nonblocking(false)?;
            Ok(Some((stream, peer)))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_string(),
        port,
    })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Instant;

    use crate::transport::PeerRecorder;

    fn endpoint() -> ListenEndpoint {
        ListenEndpoint {
            host: "127.0.0.1".to_owned(),
            port: 0,
        }
    }

    fn context(shutdown: &ShutdownToken, executor: Option<ExecutorLiveness>) -> AcceptContext {
        AcceptContext {
            registry: ConnectionRegistry::new(),
            shutdown: shutdown.clone(),
            executor,
        }
    }

    fn wait_for_peers(recorder: &PeerRecorder, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if recorder.seen() >= expected {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn tcp_listener_accepts_connections() {
        let listener = SocketListener::bind(&endpoint()).expect("bind tcp listener");
        let addr = listener.local_addr();
        let recorder = PeerRecorder::shared();
        let shutdown = ShutdownToken::new();
        let handle = listener
            .start(recorder.clone(), context(&shutdown, None))
            .expect("start listener");

        TcpStream::connect(addr).expect("connect first client");
        TcpStream::connect(addr).expect("connect second client");

        assert!(wait_for_peers(&recorder, 2), "expected two connections");
        shutdown.trigger();
        assert_eq!(handle.join().expect("join listener"), AcceptorExit::Shutdown);
    }

    #[test]
    fn listener_closes_socket_on_shutdown() {
        let listener = SocketListener::bind(&endpoint()).expect("bind tcp listener");
        let addr = listener.local_addr();
        let handler = PeerRecorder::shared();
        let shutdown = ShutdownToken::new();
        let handle = listener
            .start(handler, context(&shutdown, None))
            .expect("start listener");

        shutdown.trigger();
        handle.join().expect("join listener");
        assert!(TcpStream::connect(addr).is_err());
    }

    #[test]
    fn bind_reports_address_in_use() {
        let first = SocketListener::bind(&endpoint()).expect("bind first");
        let taken = ListenEndpoint {
            host: "127.0.0.1".to_owned(),
            port: first.local_addr().port(),
        };
        let error = SocketListener::bind(&taken).expect_err("second bind fails");
        assert!(matches!(error, ListenerError::BindTcp { .. }));
    }

    #[test]
    fn lost_executor_stops_acceptor() {
        let listener = SocketListener::bind(&endpoint()).expect("bind tcp listener");
        let handler = PeerRecorder::shared();
        let shutdown = ShutdownToken::new();
        let (liveness, guard) = ExecutorLiveness::new();
        let handle = listener
            .start(handler, context(&shutdown, Some(liveness)))
            .expect("start listener");

        drop(guard);
        assert_eq!(
            handle.join().expect("join listener"),
            AcceptorExit::ExecutorLost
        );
        assert!(shutdown.is_triggered());
    }
}
