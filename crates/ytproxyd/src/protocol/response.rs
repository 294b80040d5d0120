//! Outbound message types.
//!
//! Two families of messages share a connection: synchronous replies written
//! by the connection handler ([`Response`]) and asynchronous result envelopes
//! written by the executor ([`ResultEnvelope`]).

use std::net::SocketAddr;

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::command::QueryKind;

const UNKNOWN_QUERY: &str = "Unknown query";
const WATCH_LOCKED: &str = "Watch task is planned, no queries accepted until cancelled!";
const WATCH_CANCELLED: &str = "Watch task cancelled.";
const MALFORMED_QUERY: &str = "Malformed query, expected <type>?id=<id>?<body>";

/// Status word carried in the `response` field of synchronous replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) enum ReplyStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

/// Synchronous reply to a command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    response: ReplyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_position: Option<usize>,
}

impl Reply {
    /// Acknowledges admission of a query at the given zero-based position.
    pub(crate) fn admitted(id: &str, queue_position: usize) -> Self {
        Self {
            id: Some(id.to_owned()),
            response: ReplyStatus::Ok,
            message: None,
            queue_position: Some(queue_position),
        }
    }

    pub(crate) fn unknown_query() -> Self {
        Self::error(None, UNKNOWN_QUERY)
    }

    pub(crate) fn watch_locked(id: &str) -> Self {
        Self::error(Some(id), WATCH_LOCKED)
    }

    pub(crate) fn malformed() -> Self {
        Self::error(None, MALFORMED_QUERY)
    }

    pub(crate) fn watch_cancelled() -> Self {
        Self {
            id: None,
            response: ReplyStatus::Ok,
            message: Some(WATCH_CANCELLED.to_owned()),
            queue_position: None,
        }
    }

    fn error(id: Option<&str>, message: &str) -> Self {
        Self {
            id: id.map(str::to_owned),
            response: ReplyStatus::Error,
            message: Some(message.to_owned()),
            queue_position: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn status(&self) -> ReplyStatus {
        self.response
    }
}

/// One pending query as shown by `getCurrentQueue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct QueueEntry {
    #[serde(rename = "type")]
    pub(crate) kind: QueryKind,
    pub(crate) id: String,
    pub(crate) query: String,
}

/// One connected peer as shown by `getCurrentConnections`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct PeerEntry {
    pub(crate) ip_address: String,
    pub(crate) port: u16,
}

impl From<SocketAddr> for PeerEntry {
    fn from(addr: SocketAddr) -> Self {
        Self {
            ip_address: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

/// Anything the connection handler answers synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub(crate) enum Response {
    Reply(Reply),
    Queue(Vec<QueueEntry>),
    Connections(Vec<PeerEntry>),
}

impl From<Reply> for Response {
    fn from(reply: Reply) -> Self {
        Self::Reply(reply)
    }
}

/// Numeric result code carried in the `error` field of result envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// The fragment carries data.
    Ok,
    /// A matching fragment was found but carried no usable body.
    NoData,
    /// Navigation or transport failed, or the browser was not running.
    FetchError,
    /// No fragment matched the requested API methods.
    NoUpstreamData,
}

impl ResultCode {
    /// Wire value of the code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::NoData => 1,
            Self::FetchError => 2,
            Self::NoUpstreamData => 3,
        }
    }

    /// Message used when no more specific text is available.
    #[must_use]
    pub fn default_message(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NoData => "No data",
            Self::FetchError => "Failed to fetch data from upstream",
            Self::NoUpstreamData => "No matching upstream data",
        }
    }
}

impl Serialize for ResultCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Asynchronous result fragment streamed by the executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    /// Client supplied query id.
    pub id: String,
    /// Normalised method name, for example `getStopInfo`.
    pub method: String,
    /// Result code.
    pub error: ResultCode,
    /// Human-readable description of the result.
    pub message: String,
    /// True on every fragment of a response except the last.
    pub expect_more_data: bool,
    /// Upstream payload, present only when the fragment carries data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResultEnvelope {
    /// Builds a terminal envelope without data.
    #[must_use]
    pub fn terminal(
        id: impl Into<String>,
        method: impl Into<String>,
        code: ResultCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            error: code,
            message: message.into(),
            expect_more_data: false,
            data: None,
        }
    }
}
