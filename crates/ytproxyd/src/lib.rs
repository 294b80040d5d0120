//! Transit proxy daemon.
//!
//! The daemon fronts a single browser-automation session that can only serve
//! one logical query at a time. Many TCP clients talk to it concurrently using
//! a line-oriented protocol; every data query is admitted into one FIFO queue
//! and a single executor thread drains that queue against the browser,
//! streaming results back to whichever connection asked.
//!
//! ## Protocol
//!
//! Clients send one command per line:
//!
//! ```text
//! getStopInfo?id=42?https://yandex.ru/maps/213/moscow/?masstransit[stopId]=stop__9639753
//! ```
//!
//! The connection handler answers immediately with an admission
//! acknowledgement, and the executor later streams one or more result
//! envelopes. Every outbound message is JSON terminated by `\n\0`:
//!
//! ```text
//! {"id":"42","response":"OK","queue_position":0}
//! {"id":"42","method":"getStopInfo","error":0,"message":"OK","expect_more_data":false,"data":{...}}
//! ```
//!
//! ## Watch lock
//!
//! A `watchVehiclesInfo` query keeps refreshing until a client sends
//! `cancelWatch`; while it is active every other admission is rejected.
//!
//! ## Threads
//!
//! One acceptor thread, one thread per connection, exactly one executor
//! thread, and the main thread waiting on the shutdown token. See
//! [`Server`] for the composition and [`run_server`] for the production
//! entry point.

mod admission;
mod browser;
mod executor;
mod health;
mod placeholder_browser;
mod process;
mod protocol;
mod queue;
mod server;
pub mod telemetry;
mod transport;
mod watch;

pub use browser::{
    ApiMethod, BrowserError, BrowserService, FetchOutcome, FetchStatus, UpstreamFragment,
    normalize_method,
};
pub use executor::{ExecutorError, ExecutorSettings};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use placeholder_browser::OfflineBrowser;
pub use process::{
    ConfigLoader, LaunchError, ShutdownError, ShutdownSignal, ShutdownToken, SignalListener,
    StaticConfigLoader, SystemConfigLoader, SystemShutdownSignal, run_server,
};
pub use protocol::{QueryKind, ResultCode, ResultEnvelope};
pub use queue::QueryQueue;
pub use server::{RunningServer, Server, ServerSettings};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;
pub use watch::{WatchLock, WatchState};

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;
