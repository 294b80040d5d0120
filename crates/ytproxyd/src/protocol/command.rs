//! Classification of inbound command lines.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::browser::ApiMethod;

/// Query types admitted into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// `getStopInfo`: stop metadata and arrivals.
    StopInfo,
    /// `getRouteInfo`: route geometry and stops.
    RouteInfo,
    /// `getVehiclesInfo`: live vehicles on a route.
    VehiclesInfo,
    /// `getVehiclesInfoWithRegion`: live vehicles with region data.
    VehiclesInfoWithRegion,
    /// `getLayerRegions`: map layer regions.
    LayerRegions,
    /// `getAllInfo`: every API method the page triggers.
    AllInfo,
    /// `getEcho`: answered by the executor without touching the browser.
    Echo,
    /// `watchVehiclesInfo`: refreshes vehicles until cancelled; engages the
    /// watch lock.
    WatchVehiclesInfo,
}

impl QueryKind {
    /// Every admissible kind.
    pub const ALL: [Self; 8] = [
        Self::StopInfo,
        Self::RouteInfo,
        Self::VehiclesInfo,
        Self::VehiclesInfoWithRegion,
        Self::LayerRegions,
        Self::AllInfo,
        Self::Echo,
        Self::WatchVehiclesInfo,
    ];

    /// Canonical command name used on the wire and in result envelopes.
    #[must_use]
    pub fn command_name(self) -> &'static str {
        match self {
            Self::StopInfo => "getStopInfo",
            Self::RouteInfo => "getRouteInfo",
            Self::VehiclesInfo => "getVehiclesInfo",
            Self::VehiclesInfoWithRegion => "getVehiclesInfoWithRegion",
            Self::LayerRegions => "getLayerRegions",
            Self::AllInfo => "getAllInfo",
            Self::Echo => "getEcho",
            Self::WatchVehiclesInfo => "watchVehiclesInfo",
        }
    }

    fn from_command_name(name: &str) -> Option<Self> {
        // `getLayerRegionsInfo` follows the `get<Kind>Info` pattern; the
        // shorter form matches the upstream method name.
        if name == "getLayerRegionsInfo" {
            return Some(Self::LayerRegions);
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.command_name() == name)
    }

    /// Upstream API methods the browser is asked to capture for this kind.
    ///
    /// Echo never reaches the browser and returns an empty set.
    #[must_use]
    pub fn api_methods(self) -> &'static [ApiMethod] {
        match self {
            Self::StopInfo => &[ApiMethod::StopInfo],
            Self::RouteInfo => &[ApiMethod::RouteInfo],
            Self::VehiclesInfo | Self::WatchVehiclesInfo => &[ApiMethod::VehiclesInfo],
            Self::VehiclesInfoWithRegion => &[ApiMethod::VehiclesInfoWithRegion],
            Self::LayerRegions => &[ApiMethod::LayerRegions],
            Self::AllInfo => &ApiMethod::ALL,
            Self::Echo => &[],
        }
    }

    /// Returns true for the kind that engages the watch lock on admission.
    #[must_use]
    pub fn engages_watch(self) -> bool {
        matches!(self, Self::WatchVehiclesInfo)
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.command_name())
    }
}

impl Serialize for QueryKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.command_name())
    }
}

/// Parsed `type?id=<id>?<body>` admission line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueryRequest {
    pub(crate) kind: QueryKind,
    pub(crate) id: String,
    pub(crate) body: String,
}

/// A classified inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// `getCurrentQueue`
    CurrentQueue,
    /// `getCurrentConnections`
    CurrentConnections,
    /// `cancelWatch`
    CancelWatch,
    /// A well-formed admission line.
    Submit(QueryRequest),
    /// A recognised admission prefix whose fields did not parse.
    Malformed { kind: QueryKind },
    /// Anything else.
    Unknown,
}

const ID_PREFIX: &str = "id=";

impl Command {
    /// Classifies a single line. Surrounding whitespace is ignored.
    pub(crate) fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "getCurrentQueue" => return Self::CurrentQueue,
            "getCurrentConnections" => return Self::CurrentConnections,
            "cancelWatch" => return Self::CancelWatch,
            _ => {}
        }

        let Some((name, fields)) = line.split_once('?') else {
            return Self::Unknown;
        };
        let Some(kind) = QueryKind::from_command_name(name) else {
            return Self::Unknown;
        };

        match split_fields(fields) {
            Some((id, body)) => Self::Submit(QueryRequest {
                kind,
                id: id.to_owned(),
                body: body.to_owned(),
            }),
            None => Self::Malformed { kind },
        }
    }
}

/// Splits `id=<id>?<body>`; the body keeps any further `?` characters.
fn split_fields(fields: &str) -> Option<(&str, &str)> {
    fields.strip_prefix(ID_PREFIX)?.split_once('?')
}
