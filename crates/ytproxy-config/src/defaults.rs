//! Default values shared by the configuration surface and its tests.

use crate::logging::LogFormat;

/// Address the daemon listens on when `--host` is omitted.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// TCP port the daemon listens on when `--port` is omitted.
pub const DEFAULT_PORT: u16 = 25555;

/// Default verbosity level (`info`).
pub const DEFAULT_VERBOSITY: u8 = 2;

/// Highest accepted verbosity level (`trace`).
pub const MAX_VERBOSITY: u8 = 4;

/// Seconds the executor waits between two consecutive queries.
pub const DEFAULT_DELAY_SECS: u64 = 5;

/// Seconds between two refreshes of an active watch query.
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 5;

/// Seconds a connection read blocks before re-checking the running flag.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 5;

/// Default logging format for the daemon.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Maps a verbosity level onto a `tracing` filter directive.
///
/// Levels above [`MAX_VERBOSITY`] saturate to `trace`.
#[must_use]
pub fn verbosity_filter(level: u8) -> &'static str {
    match level {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}
