//! Structured health reporting for proxy lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use ytproxy_config::Config;

use crate::browser::BrowserError;
use crate::executor::ExecutorError;
use crate::process::LaunchError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn startup_starting(&self);

    /// Invoked once configuration has loaded.
    fn startup_succeeded(&self, config: &Config);

    /// Invoked when launch fails before or while serving.
    fn startup_failed(&self, error: &LaunchError);

    /// Invoked once the acceptor is bound.
    fn listening(&self, addr: SocketAddr);

    /// Invoked after the browser session starts.
    fn browser_ready(&self);

    /// Invoked when the browser session fails to start.
    fn browser_failed(&self, error: &BrowserError);

    /// Invoked when the executor thread dies or cannot be joined.
    fn executor_failed(&self, error: &ExecutorError);

    /// Invoked when shutdown begins.
    fn shutdown_started(&self);

    /// Invoked after every thread has been joined.
    fn shutdown_completed(&self);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn startup_starting(&self) {
        (**self).startup_starting();
    }

    fn startup_succeeded(&self, config: &Config) {
        (**self).startup_succeeded(config);
    }

    fn startup_failed(&self, error: &LaunchError) {
        (**self).startup_failed(error);
    }

    fn listening(&self, addr: SocketAddr) {
        (**self).listening(addr);
    }

    fn browser_ready(&self) {
        (**self).browser_ready();
    }

    fn browser_failed(&self, error: &BrowserError) {
        (**self).browser_failed(error);
    }

    fn executor_failed(&self, error: &ExecutorError) {
        (**self).executor_failed(error);
    }

    fn shutdown_started(&self) {
        (**self).shutdown_started();
    }

    fn shutdown_completed(&self) {
        (**self).shutdown_completed();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn startup_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "startup_starting",
            "starting proxy"
        );
    }

    fn startup_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "startup_succeeded",
            endpoint = %config.listen_endpoint(),
            delay_secs = config.delay,
            watch_interval_secs = config.watch_interval,
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "configuration loaded"
        );
    }

    fn startup_failed(&self, error: &LaunchError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "startup_failed",
            error = %error,
            "proxy failed"
        );
    }

    fn listening(&self, addr: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listening",
            addr = %addr,
            "accepting connections"
        );
    }

    fn browser_ready(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "browser_ready",
            "browser session ready"
        );
    }

    fn browser_failed(&self, error: &BrowserError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "browser_failed",
            message = %error.message(),
            error = ?error,
            "browser session failed to start"
        );
    }

    fn executor_failed(&self, error: &ExecutorError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "executor_failed",
            error = %error,
            "executor failed"
        );
    }

    fn shutdown_started(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_started",
            "shutting down"
        );
    }

    fn shutdown_completed(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_completed",
            "shutdown sequence completed"
        );
    }
}
