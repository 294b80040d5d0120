//! Process lifecycle: configuration, telemetry, signals and the server run.

mod errors;
mod launch;
mod shutdown;

pub use errors::LaunchError;
pub use launch::{ConfigLoader, StaticConfigLoader, SystemConfigLoader, run_server};
#[cfg(test)]
pub(crate) use launch::{LaunchPlan, run_server_with};
pub use shutdown::{
    ShutdownError, ShutdownSignal, ShutdownToken, SignalListener, SystemShutdownSignal,
};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
