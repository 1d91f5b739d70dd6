//! Error types for the Chatwork API client.
//!
//! # Design
//! Errors fall into two classes. Local errors (`MissingParameter`,
//! `InvalidParameter`) are raised before a request exists, so the caller
//! knows to fix its input. Remote errors are derived from the HTTP status of
//! a completed round trip. `classify` is the single place where a status code
//! becomes an error; it never retries and never swallows a failure.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::http::HttpResponse;

/// The kind of resource an endpoint addresses, used to phrase a 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Room,
    Message,
    Task,
    File,
    Contact,
    Generic,
}

impl Resource {
    pub fn noun(self) -> &'static str {
        match self {
            Resource::Room => "room",
            Resource::Message => "message",
            Resource::Task => "task",
            Resource::File => "file",
            Resource::Contact => "contact",
            Resource::Generic => "resource",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

/// Errors returned by `ChatworkClient` builders and `Call` parsing.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required parameter was absent, empty, or zero.
    #[error("missing required parameter `{name}`")]
    MissingParameter { name: &'static str },

    /// An enumerated parameter was outside its allowed set.
    #[error("invalid value {value:?} for `{name}` (allowed: {})", .allowed.join(", "))]
    InvalidParameter {
        name: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },

    /// 400: request or token parameters are missing or invalid.
    #[error("incorrect parameters: {}", .errors.join("; "))]
    IncorrectParameters { errors: Vec<String> },

    /// 401: authentication failed.
    #[error("unauthorized: the API token was rejected")]
    Unauthorized,

    /// 403: the token lacks the scope this endpoint needs.
    #[error("forbidden: the API token lacks the required scope")]
    Forbidden,

    /// 404: the addressed resource does not exist.
    #[error("{resource} not found")]
    NotFound { resource: Resource },

    /// 429: the call quota is exhausted. `reset` is the epoch second at which
    /// the quota refills, when the server said so.
    #[error("rate limited")]
    RateLimited { reset: Option<u64> },

    /// Any other status of 400 or above.
    #[error("unexpected HTTP {status}: {body}")]
    UnknownError { status: u16, body: String },

    /// A success body did not match the endpoint's result shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The host transport failed before a response was produced.
    #[error("transport failed: {0}")]
    Transport(String),
}

impl ApiError {
    /// True for errors raised before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ApiError::MissingParameter { .. } | ApiError::InvalidParameter { .. }
        )
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    errors: Vec<String>,
}

/// Map a response status onto `Ok(())` or the matching `ApiError`.
///
/// Statuses 200–399 succeed. `resource` only phrases the 404 case.
pub fn classify(response: &HttpResponse, resource: Resource) -> Result<(), ApiError> {
    match response.status {
        status if status < 400 => Ok(()),
        400 => Err(ApiError::IncorrectParameters {
            errors: error_messages(&response.body),
        }),
        401 => Err(ApiError::Unauthorized),
        403 => Err(ApiError::Forbidden),
        404 => Err(ApiError::NotFound { resource }),
        429 => Err(ApiError::RateLimited {
            reset: response.rate_limit().and_then(|limit| limit.reset),
        }),
        status => Err(ApiError::UnknownError {
            status,
            body: response.body.clone(),
        }),
    }
}

/// Chatwork reports failures as `{"errors": [...]}`; anything else yields
/// no messages.
fn error_messages(body: &str) -> Vec<String> {
    serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.errors)
        .unwrap_or_default()
}
