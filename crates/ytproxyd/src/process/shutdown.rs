use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{info, warn};

use super::PROCESS_TARGET;

#[derive(Debug, Default)]
struct TokenState {
    triggered: Mutex<bool>,
    changed: Condvar,
}

/// Cloneable, one-way shutdown flag that sleeping threads can wait on.
///
/// Once triggered it stays triggered. Waiters are woken immediately, which
/// lets pacing and idle waits end promptly on shutdown.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    state: Arc<TokenState>,
}

impl ShutdownToken {
    /// Builds an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown and wakes every waiter.
    pub fn trigger(&self) {
        let mut triggered = self.lock();
        *triggered = true;
        self.state.changed.notify_all();
    }

    /// Returns true once shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.lock()
    }

    /// Blocks until shutdown is requested.
    pub fn wait(&self) {
        let triggered = self.lock();
        let _triggered = self
            .state
            .changed
            .wait_while(triggered, |triggered| !*triggered)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Blocks until shutdown is requested or `timeout` elapses.
    ///
    /// Returns true when shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut triggered = self.lock();
        while !*triggered {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            triggered = self
                .state
                .changed
                .wait_timeout(triggered, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.state
            .triggered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Source of external shutdown requests.
pub trait ShutdownSignal: Send + Sync {
    /// Starts listening and triggers `token` when shutdown is requested.
    fn listen(&self, token: ShutdownToken) -> Result<SignalListener, ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Spawning the signal thread failed.
    #[error("failed to spawn signal thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Background signal watcher. Dropping it unregisters the handlers.
#[derive(Debug, Default)]
pub struct SignalListener {
    handle: Option<Handle>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SignalListener {
    /// Listener that watches nothing; used by callers that trigger the token
    /// themselves.
    #[must_use]
    pub fn inert() -> Self {
        Self::default()
    }

    /// Stops watching and joins the watcher thread.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: PROCESS_TARGET, "signal thread panicked");
        }
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Listener for SIGINT, SIGTERM, SIGQUIT and SIGHUP.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShutdownSignal;

impl SystemShutdownSignal {
    /// Builds the production signal source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn listen(&self, token: ShutdownToken) -> Result<SignalListener, ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("ytproxyd-signals".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    info!(
                        target: PROCESS_TARGET,
                        signal,
                        "shutdown signal received"
                    );
                    token.trigger();
                }
            })
            .map_err(|source| ShutdownError::Spawn { source })?;
        Ok(SignalListener {
            handle: Some(handle),
            thread: Some(thread),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_untriggered() {
        let token = ShutdownToken::new();
        assert!(!token.is_triggered());
        assert!(!token.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn trigger_wakes_waiters() {
        let token = ShutdownToken::new();
        let waiter = {
            let token = token.clone();
            thread::spawn(move || token.wait_timeout(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        token.trigger();
        assert!(waiter.join().expect("join waiter"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn wait_returns_once_triggered() {
        let token = ShutdownToken::new();
        token.trigger();
        token.wait();
        assert!(token.is_triggered());
    }

    #[test]
    fn inert_listener_closes_cleanly() {
        SignalListener::inert().close();
    }
}
