//! Single sequential worker that drains the query queue.
//!
//! The executor is the only caller of the browser session. It peeks the
//! oldest query, fetches it, streams the envelopes back to the originating
//! connection and only then pops the query, so queue snapshots show in-flight
//! work. Consecutive queries are spaced by a configurable delay.

mod outcome;
mod pacer;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use ytproxy_config::Config;

use self::outcome::{echo_envelope, envelopes_for};
use self::pacer::{PaceOutcome, Pacer};
use crate::browser::BrowserService;
use crate::process::ShutdownToken;
use crate::protocol::{QueryKind, ResultEnvelope};
use crate::queue::{Query, QueryQueue};
use crate::watch::WatchLock;

pub(crate) const EXECUTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::executor");

/// Longest idle wait before the executor re-checks for shutdown.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Timing knobs for the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Pause after each finished query.
    pub delay: Duration,
    /// Pause between two rounds of a watch query.
    pub watch_interval: Duration,
}

impl From<&Config> for ExecutorSettings {
    fn from(config: &Config) -> Self {
        Self {
            delay: config.inter_query_delay(),
            watch_interval: config.watch_interval(),
        }
    }
}

/// Errors raised while running the executor thread.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The thread could not be spawned.
    #[error("failed to spawn executor thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The executor thread panicked.
    #[error("executor thread panicked")]
    Panicked,
}

/// Read-only view of whether the executor thread is still running.
#[derive(Debug, Clone)]
pub(crate) struct ExecutorLiveness {
    alive: Arc<AtomicBool>,
}

/// Held by the executor thread; dropping it, including by unwinding, marks
/// the executor dead.
#[derive(Debug)]
pub(crate) struct AliveGuard {
    alive: Arc<AtomicBool>,
}

impl ExecutorLiveness {
    pub(crate) fn new() -> (Self, AliveGuard) {
        let alive = Arc::new(AtomicBool::new(true));
        (
            Self {
                alive: Arc::clone(&alive),
            },
            AliveGuard { alive },
        )
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

pub(crate) struct Executor<B> {
    browser: B,
    queue: QueryQueue,
    watch: WatchLock,
    shutdown: ShutdownToken,
    pacer: Pacer,
    settings: ExecutorSettings,
}

impl<B> Executor<B>
where
    B: BrowserService + 'static,
{
    pub(crate) fn new(
        browser: B,
        queue: QueryQueue,
        watch: WatchLock,
        shutdown: ShutdownToken,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            browser,
            queue,
            watch,
            pacer: Pacer::new(shutdown.clone()),
            shutdown,
            settings,
        }
    }

    /// Moves the executor onto its own thread.
    pub(crate) fn spawn(self) -> Result<ExecutorHandle<B>, ExecutorError> {
        let (liveness, guard) = ExecutorLiveness::new();
        let thread = thread::Builder::new()
            .name("ytproxyd-executor".to_owned())
            .spawn(move || self.run(guard))
            .map_err(|source| ExecutorError::Spawn { source })?;
        Ok(ExecutorHandle { thread, liveness })
    }

    /// Runs until shutdown and hands the browser back for teardown.
    fn run(mut self, _alive: AliveGuard) -> B {
        info!(
            target: EXECUTOR_TARGET,
            delay_ms = self.settings.delay.as_millis(),
            watch_interval_ms = self.settings.watch_interval.as_millis(),
            "executor started"
        );
        while self.run_once() {}
        info!(target: EXECUTOR_TARGET, pending = self.queue.len(), "executor stopped");
        self.browser
    }

    /// Processes at most one query. Returns false once shutdown is requested.
    pub(crate) fn run_once(&mut self) -> bool {
        if self.shutdown.is_triggered() {
            return false;
        }
        let shutdown = &self.shutdown;
        let Some(query) = self
            .queue
            .wait_front(IDLE_POLL, || shutdown.is_triggered())
        else {
            return !self.shutdown.is_triggered();
        };

        self.execute(&query);
        self.queue.pop_front();

        !matches!(self.pacer.wait(self.settings.delay), PaceOutcome::Shutdown)
    }

    fn execute(&mut self, query: &Query) {
        let request = &query.request;
        debug!(
            target: EXECUTOR_TARGET,
            id = %request.id,
            kind = %request.kind,
            peer = %query.origin.peer(),
            "executing query"
        );
        match request.kind {
            QueryKind::Echo => self.stream(query, &[echo_envelope(request)]),
            QueryKind::WatchVehiclesInfo => self.watch(query),
            _ => self.fetch_and_stream(query),
        }
    }

    fn fetch_and_stream(&mut self, query: &Query) {
        let request = &query.request;
        let outcome = self.browser.fetch(&request.body, request.kind.api_methods());
        self.stream(query, &envelopes_for(request, &outcome));
    }

    /// Repeats the fetch every watch interval until the lock is released.
    fn watch(&mut self, query: &Query) {
        let mut round = 0_u64;
        loop {
            round += 1;
            debug!(
                target: EXECUTOR_TARGET,
                id = %query.request.id,
                round,
                "watch round"
            );
            self.fetch_and_stream(query);
            let watch = &self.watch;
            match self
                .pacer
                .wait_while(self.settings.watch_interval, || watch.is_engaged())
            {
                PaceOutcome::Elapsed => {}
                PaceOutcome::Interrupted | PaceOutcome::Shutdown => break,
            }
        }
        info!(
            target: EXECUTOR_TARGET,
            id = %query.request.id,
            rounds = round,
            "watch finished"
        );
    }

    fn stream(&self, query: &Query, envelopes: &[ResultEnvelope]) {
        for envelope in envelopes {
            if !query.origin.deliver(envelope) {
                warn!(
                    target: EXECUTOR_TARGET,
                    id = %envelope.id,
                    method = %envelope.method,
                    peer = %query.origin.peer(),
                    "dropping remaining envelopes for unreachable client"
                );
                return;
            }
            info!(
                target: EXECUTOR_TARGET,
                id = %envelope.id,
                method = %envelope.method,
                code = envelope.error.code(),
                expect_more_data = envelope.expect_more_data,
                "result delivered"
            );
        }
    }
}

/// Handle to the running executor thread.
#[derive(Debug)]
pub(crate) struct ExecutorHandle<B> {
    thread: thread::JoinHandle<B>,
    liveness: ExecutorLiveness,
}

impl<B> ExecutorHandle<B> {
    pub(crate) fn liveness(&self) -> ExecutorLiveness {
        self.liveness.clone()
    }

    /// Waits for the thread and returns the browser it owned.
    pub(crate) fn join(self) -> Result<B, ExecutorError> {
        self.thread.join().map_err(|_| ExecutorError::Panicked)
    }
}
