//! Browser service used when no automation backend is wired in.

use crate::browser::{ApiMethod, BrowserError, BrowserService, FetchOutcome, FetchStatus};

const BROWSER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::browser::offline");

/// Service that accepts every lifecycle call and answers every fetch with
/// [`FetchStatus::NotRunning`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBrowser;

impl BrowserService for OfflineBrowser {
    fn start(&mut self) -> Result<(), BrowserError> {
        tracing::warn!(
            target: BROWSER_TARGET,
            "no browser automation backend configured; queries will report fetch errors"
        );
        Ok(())
    }

    fn fetch(&mut self, url: &str, methods: &[ApiMethod]) -> FetchOutcome {
        tracing::debug!(
            target: BROWSER_TARGET,
            url,
            methods = methods.len(),
            "fetch requested without a running browser"
        );
        FetchOutcome::failed(FetchStatus::NotRunning)
    }

    fn stop(&mut self) {}
}
