//! Interface to the browser-automation session.
//!
//! The session loads a page, watches the network log for calls to the
//! masstransit API and hands back the captured bodies as fragments. Only one
//! logical query may run against it at a time, which is why the executor is
//! its sole caller.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

const API_PREFIX: &str = "maps/api/masstransit/";

/// Upstream API methods the browser can capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    /// `maps/api/masstransit/getRouteInfo`
    RouteInfo,
    /// `maps/api/masstransit/getLine`
    Line,
    /// `maps/api/masstransit/getStopInfo`
    StopInfo,
    /// `maps/api/masstransit/getVehiclesInfo`
    VehiclesInfo,
    /// `maps/api/masstransit/getVehiclesInfoWithRegion`
    VehiclesInfoWithRegion,
    /// `maps/api/masstransit/getLayerRegions`
    LayerRegions,
}

impl ApiMethod {
    /// Every known upstream method.
    pub const ALL: [Self; 6] = [
        Self::RouteInfo,
        Self::Line,
        Self::StopInfo,
        Self::VehiclesInfo,
        Self::VehiclesInfoWithRegion,
        Self::LayerRegions,
    ];

    /// Normalised method name used in result envelopes.
    #[must_use]
    pub fn local_name(self) -> &'static str {
        match self {
            Self::RouteInfo => "getRouteInfo",
            Self::Line => "getLine",
            Self::StopInfo => "getStopInfo",
            Self::VehiclesInfo => "getVehiclesInfo",
            Self::VehiclesInfoWithRegion => "getVehiclesInfoWithRegion",
            Self::LayerRegions => "getLayerRegions",
        }
    }

    /// Path fragment that identifies the method in captured request URLs.
    #[must_use]
    pub fn upstream_path(self) -> String {
        format!("{API_PREFIX}{}", self.local_name())
    }

    /// Resolves an upstream path such as `maps/api/masstransit/getLine`.
    #[must_use]
    pub fn from_upstream(path: &str) -> Option<Self> {
        let name = path.strip_prefix(API_PREFIX)?;
        Self::ALL
            .into_iter()
            .find(|method| method.local_name() == name)
    }
}

impl fmt::Display for ApiMethod {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.local_name())
    }
}

/// Maps an upstream method path to its local name.
///
/// Unknown names pass through unchanged.
#[must_use]
pub fn normalize_method(upstream: &str) -> String {
    ApiMethod::from_upstream(upstream)
        .map_or_else(|| upstream.to_owned(), |method| method.local_name().to_owned())
}

/// One captured upstream response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamFragment {
    /// URL of the captured request.
    pub url: String,
    /// Normalised method name.
    pub method: String,
    /// `"OK"` when `data` holds a parsed body, otherwise a failure description.
    pub error: String,
    /// Parsed response body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl UpstreamFragment {
    /// Builds a fragment carrying a parsed body.
    #[must_use]
    pub fn with_data(url: impl Into<String>, method: ApiMethod, data: Value) -> Self {
        Self {
            url: url.into(),
            method: method.local_name().to_owned(),
            error: "OK".to_owned(),
            data: Some(data),
        }
    }

    /// Builds a fragment whose body could not be read.
    #[must_use]
    pub fn without_data(
        url: impl Into<String>,
        method: ApiMethod,
        error: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.local_name().to_owned(),
            error: error.into(),
            data: None,
        }
    }
}

/// Overall status of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Fragments were captured.
    Ok,
    /// The session has not been started or has died.
    NotRunning,
    /// The page loaded but no captured call matched the requested methods.
    NoMatchingFragment,
    /// Navigation or network transport failed.
    TransportError,
}

/// Result of [`BrowserService::fetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Captured fragments in capture order.
    pub fragments: Vec<UpstreamFragment>,
    /// Overall status.
    pub status: FetchStatus,
}

impl FetchOutcome {
    /// Successful fetch with the supplied fragments.
    #[must_use]
    pub fn ok(fragments: Vec<UpstreamFragment>) -> Self {
        Self {
            fragments,
            status: FetchStatus::Ok,
        }
    }

    /// Fetch that produced no fragments.
    #[must_use]
    pub fn failed(status: FetchStatus) -> Self {
        Self {
            fragments: Vec::new(),
            status,
        }
    }
}

/// Errors raised by the browser session lifecycle.
#[derive(Debug, Error)]
#[error("browser session failed to {action}: {message}")]
pub struct BrowserError {
    action: &'static str,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BrowserError {
    /// Builds a start-up failure.
    #[must_use]
    pub fn start(message: impl Into<String>) -> Self {
        Self {
            action: "start",
            message: message.into(),
            source: None,
        }
    }

    /// Builds a start-up failure wrapping an underlying error.
    #[must_use]
    pub fn start_with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            action: "start",
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-readable message describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Browser session driven by the executor.
///
/// `start` and `stop` are each called once by the server; `fetch` is only
/// ever called from the executor thread, one query at a time.
#[cfg_attr(test, mockall::automock)]
pub trait BrowserService: Send {
    /// Brings the session up.
    fn start(&mut self) -> Result<(), BrowserError>;

    /// Loads `url` and returns every captured call to one of `methods`.
    fn fetch(&mut self, url: &str, methods: &[ApiMethod]) -> FetchOutcome;

    /// Tears the session down.
    fn stop(&mut self);
}

impl<T> BrowserService for Box<T>
where
    T: BrowserService + ?Sized,
{
    fn start(&mut self) -> Result<(), BrowserError> {
        (**self).start()
    }

    fn fetch(&mut self, url: &str, methods: &[ApiMethod]) -> FetchOutcome {
        (**self).fetch(url, methods)
    }

    fn stop(&mut self) {
        (**self).stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case("maps/api/masstransit/getStopInfo", "getStopInfo")]
    #[case("maps/api/masstransit/getRouteInfo", "getRouteInfo")]
    #[case("maps/api/masstransit/getLine", "getLine")]
    #[case("maps/api/masstransit/getVehiclesInfo", "getVehiclesInfo")]
    #[case(
        "maps/api/masstransit/getVehiclesInfoWithRegion",
        "getVehiclesInfoWithRegion"
    )]
    #[case("maps/api/masstransit/getLayerRegions", "getLayerRegions")]
    #[case("maps/api/masstransit/getSomethingNew", "maps/api/masstransit/getSomethingNew")]
    #[case("getStopInfo", "getStopInfo")]
    fn normalizes_upstream_names(#[case] upstream: &str, #[case] expected: &str) {
        assert_eq!(normalize_method(upstream), expected);
    }

    #[test]
    fn upstream_path_round_trips() {
        for method in ApiMethod::ALL {
            assert_eq!(ApiMethod::from_upstream(&method.upstream_path()), Some(method));
        }
    }

    #[test]
    fn fragment_constructors_tag_method() {
        let fragment = UpstreamFragment::without_data(
            "https://example/api",
            ApiMethod::Line,
            "Failed to parse JSON",
        );
        assert_eq!(fragment.method, "getLine");
        assert!(fragment.data.is_none());
    }

    #[test]
    fn boxed_services_delegate() {
        let mut mock = MockBrowserService::new();
        mock.expect_fetch()
            .returning(|_, _| FetchOutcome::failed(FetchStatus::NotRunning));
        let mut boxed: Box<dyn BrowserService> = Box::new(mock);
        let outcome = boxed.fetch("https://example", &[ApiMethod::StopInfo]);
        assert_eq!(outcome.status, FetchStatus::NotRunning);
    }
}
