//! Error types for the sketch API client.
//!
//! # Design
//! `RateLimited` is kept apart from `Api` because callers usually want to
//! back off further at the application level rather than give up. All other
//! non-2xx responses land in `Api` with the parsed error envelope when the
//! server sent one, and the raw body either way.

use thiserror::Error;

use crate::request::Response;
use crate::types::ErrorEnvelope;

/// Failure to obtain any response for an attempt. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    /// Connection refused, DNS failure, TLS failure and the like.
    #[error("network error: {0}")]
    Network(String),
}

/// Errors returned by `SketchClient`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid base URL, credential or option. Raised at construction only.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server kept answering 429 until the retry policy was exhausted.
    /// Carries the final 429 response.
    #[error("rate limited (HTTP 429)")]
    RateLimited(Response),

    /// Any other non-2xx status.
    #[error("HTTP {status}: {body}")]
    Api {
        status: u16,
        envelope: Option<ErrorEnvelope>,
        body: String,
    },

    /// A request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ClientError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::RateLimited(response) => Some(response.status),
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
