//! Supervises launch sequencing and the server run.

use std::sync::Arc;

use tracing::info;

use ytproxy_config::{Config, ConfigError};

use crate::browser::BrowserService;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::placeholder_browser::OfflineBrowser;
use crate::server::{Server, ServerSettings};
use crate::telemetry;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, ShutdownToken, SystemShutdownSignal};

/// Abstraction over configuration sources.
pub trait ConfigLoader: Send + Sync {
    /// Loads the proxy configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration cannot be resolved.
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load()
    }
}

/// Loader that returns a pre-built configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.config.clone())
    }
}

/// Collaborators required to launch the proxy.
pub(crate) struct LaunchPlan<L, S, B> {
    pub(crate) loader: L,
    pub(crate) signal: S,
    pub(crate) browser: B,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    /// Token the signal listener triggers; callers may keep a clone.
    pub(crate) shutdown: ShutdownToken,
}

/// Runs the proxy with the production collaborators until a termination
/// signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when configuration, binding or the executor fails.
pub fn run_server() -> Result<(), LaunchError> {
    run_server_with(LaunchPlan {
        loader: SystemConfigLoader,
        signal: SystemShutdownSignal::new(),
        browser: OfflineBrowser,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: ShutdownToken::new(),
    })
}

/// Runs the proxy with injected collaborators.
pub(crate) fn run_server_with<L, S, B>(plan: LaunchPlan<L, S, B>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
    B: BrowserService + 'static,
{
    let reporter = Arc::clone(&plan.reporter);
    reporter.startup_starting();
    let result = launch(plan);
    if let Err(error) = &result {
        reporter.startup_failed(error);
    }
    result
}

fn launch<L, S, B>(plan: LaunchPlan<L, S, B>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
    B: BrowserService + 'static,
{
    let LaunchPlan {
        loader,
        signal,
        browser,
        reporter,
        shutdown,
    } = plan;

    let config = loader.load()?;
    telemetry::initialise(&config)?;
    reporter.startup_succeeded(&config);

    let signals = signal.listen(shutdown.clone())?;
    let server = Server::start(ServerSettings::from(&config), browser, reporter, shutdown)?;
    info!(
        target: PROCESS_TARGET,
        addr = %server.local_addr(),
        "proxy running"
    );
    let result = server.wait();
    signals.close();
    result
}
