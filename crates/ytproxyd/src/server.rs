//! Composition of the acceptor, connection handlers and executor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use ytproxy_config::{Config, ListenEndpoint};

use crate::admission::Admission;
use crate::browser::BrowserService;
use crate::executor::{Executor, ExecutorHandle, ExecutorSettings};
use crate::health::HealthReporter;
use crate::process::{LaunchError, PROCESS_TARGET, ShutdownToken};
use crate::queue::QueryQueue;
use crate::transport::{
    AcceptContext, AcceptorExit, ConnectionRegistry, ListenerHandle, QueryConnectionHandler,
    SocketListener,
};
use crate::watch::WatchLock;

/// Settings consumed by [`Server::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Endpoint to bind.
    pub endpoint: ListenEndpoint,
    /// Read timeout on client sockets; bounds how long a handler takes to
    /// notice shutdown.
    pub read_timeout: Duration,
    /// Executor pacing.
    pub executor: ExecutorSettings,
}

impl From<&Config> for ServerSettings {
    fn from(config: &Config) -> Self {
        Self {
            endpoint: config.listen_endpoint(),
            read_timeout: config.read_timeout(),
            executor: ExecutorSettings::from(config),
        }
    }
}

/// Entry point for starting the proxy threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Server;

impl Server {
    /// Binds the endpoint, starts the browser, the executor and the acceptor.
    ///
    /// Nothing is left running when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when binding, browser start-up or thread
    /// spawning fails.
    pub fn start<B>(
        settings: ServerSettings,
        mut browser: B,
        reporter: Arc<dyn HealthReporter>,
        shutdown: ShutdownToken,
    ) -> Result<RunningServer<B>, LaunchError>
    where
        B: BrowserService + 'static,
    {
        let listener = SocketListener::bind(&settings.endpoint)?;
        let local_addr = listener.local_addr();

        if let Err(error) = browser.start() {
            reporter.browser_failed(&error);
            return Err(error.into());
        }
        reporter.browser_ready();

        let queue = QueryQueue::new();
        let watch = WatchLock::new();
        let registry = ConnectionRegistry::new();

        let executor = Executor::new(
            browser,
            queue.clone(),
            watch.clone(),
            shutdown.clone(),
            settings.executor,
        )
        .spawn()?;

        let handler = Arc::new(QueryConnectionHandler::new(
            Admission::new(queue.clone(), watch.clone(), registry.clone()),
            shutdown.clone(),
            settings.read_timeout,
        ));
        let context = AcceptContext {
            registry,
            shutdown: shutdown.clone(),
            executor: Some(executor.liveness()),
        };
        let listener = match listener.start(handler, context) {
            Ok(listener) => listener,
            Err(error) => {
                shutdown.trigger();
                queue.interrupt();
                match executor.join() {
                    Ok(mut browser) => browser.stop(),
                    Err(join_error) => reporter.executor_failed(&join_error),
                }
                return Err(error.into());
            }
        };
        reporter.listening(local_addr);

        Ok(RunningServer {
            local_addr,
            shutdown,
            queue,
            watch,
            listener,
            executor,
            reporter,
        })
    }
}

/// Handle to a started server.
pub struct RunningServer<B> {
    local_addr: SocketAddr,
    shutdown: ShutdownToken,
    queue: QueryQueue,
    watch: WatchLock,
    listener: ListenerHandle,
    executor: ExecutorHandle<B>,
    reporter: Arc<dyn HealthReporter>,
}

impl<B> RunningServer<B>
where
    B: BrowserService,
{
    /// Address the acceptor is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token that stops the server when triggered.
    #[must_use]
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// The shared query queue.
    #[must_use]
    pub fn queue(&self) -> &QueryQueue {
        &self.queue
    }

    /// The shared watch lock.
    #[must_use]
    pub fn watch_lock(&self) -> &WatchLock {
        &self.watch
    }

    /// Blocks until shutdown is requested, then tears everything down.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when the executor died or a thread panicked.
    pub fn wait(self) -> Result<(), LaunchError> {
        self.shutdown.wait();
        self.teardown()
    }

    /// Requests shutdown and tears everything down.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when the executor died or a thread panicked.
    pub fn stop(self) -> Result<(), LaunchError> {
        self.shutdown.trigger();
        self.teardown()
    }

    fn teardown(self) -> Result<(), LaunchError> {
        let Self {
            queue,
            watch,
            listener,
            executor,
            reporter,
            ..
        } = self;
        reporter.shutdown_started();
        watch.release();
        queue.interrupt();

        let exit = listener.join();
        let mut browser = match executor.join() {
            Ok(browser) => browser,
            Err(error) => {
                reporter.executor_failed(&error);
                return Err(error.into());
            }
        };
        browser.stop();

        let dropped = queue.len();
        if dropped > 0 {
            warn!(
                target: PROCESS_TARGET,
                dropped,
                "pending queries discarded at shutdown"
            );
        }

        match exit? {
            AcceptorExit::Shutdown => {
                reporter.shutdown_completed();
                info!(target: PROCESS_TARGET, "server stopped");
                Ok(())
            }
            AcceptorExit::ExecutorLost => Err(LaunchError::ExecutorStopped),
        }
    }
}

impl<B> std::fmt::Debug for RunningServer<B> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RunningServer")
            .field("local_addr", &self.local_addr)
            .field("queue", &self.queue)
            .field("watch", &self.watch.state())
            .finish_non_exhaustive()
    }
}
