//! Defines the unified error surface for launching and running the proxy.

use thiserror::Error;

use ytproxy_config::ConfigError;

use crate::browser::BrowserError;
use crate::executor::ExecutorError;
use crate::telemetry::TelemetryError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the proxy.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: ConfigError,
    },
    /// Telemetry could not be installed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Installing the shutdown signal listener failed.
    #[error("failed to listen for shutdown signals: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// The browser session failed to start.
    #[error("browser session failed: {source}")]
    Browser {
        /// Underlying browser error.
        #[source]
        source: BrowserError,
    },
    /// Socket listener startup failed.
    #[error("socket listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// The executor thread failed.
    #[error("executor failed: {source}")]
    Executor {
        /// Underlying executor error.
        #[source]
        source: ExecutorError,
    },
    /// The executor stopped while the server was still accepting.
    #[error("executor stopped unexpectedly")]
    ExecutorStopped,
}

impl From<ConfigError> for LaunchError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<BrowserError> for LaunchError {
    fn from(source: BrowserError) -> Self {
        Self::Browser { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<ExecutorError> for LaunchError {
    fn from(source: ExecutorError) -> Self {
        Self::Executor { source }
    }
}
