//! Maps browser fetch outcomes onto result envelopes.

use serde_json::Value;

use crate::browser::{FetchOutcome, FetchStatus, UpstreamFragment, normalize_method};
use crate::protocol::{QueryRequest, ResultCode, ResultEnvelope};

const NOT_RUNNING: &str = "Browser session is not running";

/// Builds the envelopes streamed back for one fetch.
///
/// Always returns at least one envelope, and only the last one has
/// `expect_more_data` cleared.
pub(crate) fn envelopes_for(request: &QueryRequest, outcome: &FetchOutcome) -> Vec<ResultEnvelope> {
    let kind_name = request.kind.command_name();
    match outcome.status {
        FetchStatus::NotRunning => vec![ResultEnvelope::terminal(
            &request.id,
            kind_name,
            ResultCode::FetchError,
            NOT_RUNNING,
        )],
        FetchStatus::TransportError => vec![ResultEnvelope::terminal(
            &request.id,
            kind_name,
            ResultCode::FetchError,
            ResultCode::FetchError.default_message(),
        )],
        FetchStatus::Ok | FetchStatus::NoMatchingFragment if outcome.fragments.is_empty() => {
            vec![ResultEnvelope::terminal(
                &request.id,
                kind_name,
                ResultCode::NoUpstreamData,
                ResultCode::NoUpstreamData.default_message(),
            )]
        }
        FetchStatus::Ok | FetchStatus::NoMatchingFragment => {
            let last = outcome.fragments.len() - 1;
            outcome
                .fragments
                .iter()
                .enumerate()
                .map(|(index, fragment)| fragment_envelope(&request.id, fragment, index < last))
                .collect()
        }
    }
}

fn fragment_envelope(id: &str, fragment: &UpstreamFragment, expect_more_data: bool) -> ResultEnvelope {
    let (error, message) = match &fragment.data {
        Some(_) => (ResultCode::Ok, ResultCode::Ok.default_message()),
        None if fragment.error.is_empty() => (ResultCode::NoData, ResultCode::NoData.default_message()),
        None => (ResultCode::NoData, fragment.error.as_str()),
    };
    ResultEnvelope {
        id: id.to_owned(),
        method: normalize_method(&fragment.method),
        error,
        message: message.to_owned(),
        expect_more_data,
        data: fragment.data.clone(),
    }
}

/// Echo answers carry the request body back as a JSON string.
pub(crate) fn echo_envelope(request: &QueryRequest) -> ResultEnvelope {
    ResultEnvelope {
        data: Some(Value::String(request.body.clone())),
        ..ResultEnvelope::terminal(
            &request.id,
            request.kind.command_name(),
            ResultCode::Ok,
            ResultCode::Ok.default_message(),
        )
    }
}
