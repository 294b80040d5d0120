//! Shared configuration for the transit proxy daemon.
//!
//! Configuration is layered the usual way: command-line flags win over
//! `YTPROXY_*` environment variables, which win over the compiled defaults in
//! [`defaults`]. Parsing is delegated to `clap`; the resulting [`Config`]
//! exposes typed accessors so the daemon never deals with raw seconds or
//! verbosity numbers.

use std::ffi::OsString;
use std::fmt;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

pub mod defaults;
mod logging;

pub use defaults::{
    DEFAULT_DELAY_SECS, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_READ_TIMEOUT_SECS, DEFAULT_VERBOSITY,
    DEFAULT_WATCH_INTERVAL_SECS, MAX_VERBOSITY, default_log_format, verbosity_filter,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    name = "ytproxyd",
    version,
    about = "Serialises transit API queries onto a single browser session"
)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "YTPROXY_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// TCP port to listen on.
    #[arg(long, env = "YTPROXY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Log verbosity from 0 (errors only) to 4 (trace).
    #[arg(
        long,
        env = "YTPROXY_VERBOSE",
        default_value_t = DEFAULT_VERBOSITY,
        value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_VERBOSITY))
    )]
    pub verbose: u8,
    /// Seconds to wait between two queries sent to the browser.
    #[arg(
        long,
        env = "YTPROXY_DELAY",
        default_value_t = DEFAULT_DELAY_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub delay: u64,
    /// Seconds between refreshes of an active watch query.
    #[arg(
        long,
        env = "YTPROXY_WATCH_INTERVAL",
        default_value_t = DEFAULT_WATCH_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub watch_interval: u64,
    /// Seconds a connection read blocks before re-checking for shutdown.
    #[arg(
        long,
        env = "YTPROXY_READ_TIMEOUT",
        default_value_t = DEFAULT_READ_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub read_timeout: u64,
    /// Explicit `tracing` filter; overrides `--verbose` when present.
    #[arg(long, env = "YTPROXY_LOG_FILTER")]
    pub log_filter: Option<String>,
    /// Log output format.
    #[arg(long, env = "YTPROXY_LOG_FORMAT", default_value_t = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            verbose: DEFAULT_VERBOSITY,
            delay: DEFAULT_DELAY_SECS,
            watch_interval: DEFAULT_WATCH_INTERVAL_SECS,
            read_timeout: DEFAULT_READ_TIMEOUT_SECS,
            log_filter: None,
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the arguments fail to parse or validate,
    /// including the `--help` and `--version` pseudo-errors raised by `clap`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is treated as the binary name, mirroring
    /// `std::env::args_os`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the arguments fail to parse or validate.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::try_parse_from(args)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if let Some(filter) = &self.log_filter
            && filter.trim().is_empty()
        {
            return Err(ConfigError::EmptyLogFilter);
        }
        Ok(())
    }

    /// Endpoint the acceptor binds to.
    #[must_use]
    pub fn listen_endpoint(&self) -> ListenEndpoint {
        ListenEndpoint {
            host: self.host.trim().to_owned(),
            port: self.port,
        }
    }

    /// Pause between two consecutive executor queries.
    #[must_use]
    pub fn inter_query_delay(&self) -> Duration {
        Duration::from_secs(self.delay)
    }

    /// Pause between two refreshes of a watch query.
    #[must_use]
    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval)
    }

    /// Read timeout applied to client sockets.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    /// Filter expression handed to the telemetry subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        match &self.log_filter {
            Some(filter) => filter.as_str(),
            None => verbosity_filter(self.verbose),
        }
    }

    /// Selected log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Host and port pair the daemon listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenEndpoint {
    /// Host name or IP literal.
    pub host: String,
    /// TCP port; `0` asks the OS for an ephemeral port.
    pub port: u16,
}

impl ListenEndpoint {
    /// Builds an endpoint from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ListenEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(formatter, "[{}]:{}", self.host, self.port)
        } else {
            write!(formatter, "{}:{}", self.host, self.port)
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Argument parsing failed, or help/version output was requested.
    #[error(transparent)]
    Arguments(#[from] clap::Error),
    /// The listen host was blank.
    #[error("listen host must not be empty")]
    EmptyHost,
    /// The explicit log filter was blank.
    #[error("log filter must not be empty")]
    EmptyLogFilter,
}

impl ConfigError {
    /// Returns the underlying `clap` error when parsing failed.
    #[must_use]
    pub fn as_clap(&self) -> Option<&clap::Error> {
        match self {
            Self::Arguments(error) => Some(error),
            Self::EmptyHost | Self::EmptyLogFilter => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[test]
    fn default_matches_parsed_defaults() {
        let parsed = Config::load_from_iter(["ytproxyd"]).expect("defaults should parse");
        assert_eq!(parsed, Config::default());
    }

    #[rstest]
    #[case(0, "error")]
    #[case(1, "warn")]
    #[case(2, "info")]
    #[case(3, "debug")]
    #[case(4, "trace")]
    fn verbosity_maps_to_filter(#[case] level: u8, #[case] expected: &str) {
        let config = Config {
            verbose: level,
            ..Config::default()
        };
        assert_eq!(config.log_filter(), expected);
    }

    #[test]
    fn explicit_filter_overrides_verbosity() {
        let config = Config {
            verbose: 4,
            log_filter: Some("ytproxyd=debug".to_owned()),
            ..Config::default()
        };
        assert_eq!(config.log_filter(), "ytproxyd=debug");
    }

    #[rstest]
    #[case("127.0.0.1", 25555, "127.0.0.1:25555")]
    #[case("::1", 8080, "[::1]:8080")]
    #[case("localhost", 0, "localhost:0")]
    fn endpoint_display(#[case] host: &str, #[case] port: u16, #[case] expected: &str) {
        assert_eq!(ListenEndpoint::new(host, port).to_string(), expected);
    }

    #[test]
    fn durations_follow_seconds() {
        let config = Config {
            delay: 7,
            watch_interval: 3,
            read_timeout: 2,
            ..Config::default()
        };
        assert_eq!(config.inter_query_delay(), Duration::from_secs(7));
        assert_eq!(config.watch_interval(), Duration::from_secs(3));
        assert_eq!(config.read_timeout(), Duration::from_secs(2));
    }
}
