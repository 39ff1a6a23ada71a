//! Error types for the Crosswire policy API.

use std::fmt;

use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::wire::DecodeError;

/// `X-Request-Id` reported by the service, kept for support requests.
///
/// Displays as a bracketed suffix, or as nothing when the service did not
/// send exactly one request id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceId(pub Option<String>);

impl TraceId {
    #[must_use]
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(id) => write!(f, " [trace ID: {id}]"),
            None => Ok(()),
        }
    }
}

impl From<Option<String>> for TraceId {
    fn from(id: Option<String>) -> Self {
        Self(id)
    }
}

/// Errors returned by Crosswire API clients and lifecycle operations.
///
/// Remote failures keep the status code, trace id and raw body so they can be
/// passed on to support without further parsing.
#[derive(Debug, Error)]
pub enum CrosswireError {
    /// No API token was configured; no request was sent.
    #[error(
        "missing Crosswire API token: set `api_token` in the configuration or the CROSSWIRE_API_TOKEN environment variable"
    )]
    MissingToken,

    /// The configuration could not be resolved.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The request never produced an HTTP response.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The service answered with a non-success status.
    #[error("HTTP response code {status}{trace_id}: {body}")]
    Http {
        status: u16,
        trace_id: TraceId,
        body: String,
    },

    /// The response body is not a JSON object.
    #[error("HTTP response code {status}{trace_id}: invalid JSON ({source}): {body}")]
    InvalidJson {
        status: u16,
        trace_id: TraceId,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// The credential check answered without a `success` flag.
    #[error("received invalid response body{trace_id}: {body}")]
    MalformedResponse { body: String, trace_id: TraceId },

    /// The response body does not describe a policy.
    #[error("could not decode policy{trace_id}: {source}; body: {body}")]
    Decode {
        #[source]
        source: DecodeError,
        trace_id: TraceId,
        body: String,
    },

    /// A policy could not be serialized into a request body.
    #[error("could not encode policy: {0}")]
    Encode(#[from] serde_json::Error),

    /// The service reported the credentials as invalid.
    #[error("client validation failed: the Crosswire API token was rejected")]
    CredentialsRejected,

    /// The policy failed validation; nothing was sent.
    #[error("policy failed validation: {0}")]
    Validation(Diagnostics),

    /// The operation is not offered by the service.
    #[error("{operation} is not yet supported")]
    Unsupported { operation: &'static str },
}

impl CrosswireError {
    /// Request id reported by the service for this failure, if any.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        match self {
            Self::Http { trace_id, .. }
            | Self::InvalidJson { trace_id, .. }
            | Self::MalformedResponse { trace_id, .. }
            | Self::Decode { trace_id, .. } => trace_id.as_deref(),
            _ => None,
        }
    }

    /// Decode failure behind this error, if any.
    #[must_use]
    pub fn decode_error(&self) -> Option<&DecodeError> {
        match self {
            Self::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn http_error_mentions_status_trace_and_body() {
        let err = CrosswireError::Http {
            status: 502,
            trace_id: TraceId(Some("req-42".to_owned())),
            body: "upstream unavailable".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP response code 502 [trace ID: req-42]: upstream unavailable"
        );
        assert_eq!(err.trace_id(), Some("req-42"));
    }

    #[test]
    fn missing_trace_id_is_omitted() {
        let err = CrosswireError::MalformedResponse {
            body: "{}".to_owned(),
            trace_id: TraceId::default(),
        };
        assert_eq!(err.to_string(), "received invalid response body: {}");
        assert_eq!(err.trace_id(), None);
    }
}
