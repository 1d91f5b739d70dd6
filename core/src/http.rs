//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The core
//! crate builds `HttpRequest` values and classifies `HttpResponse` values
//! without touching the network. `Transport` is the one seam where a host
//! plugs in its fetch primitive; the core never owns a socket, a timeout, or
//! a retry policy.
//!
//! Request bodies are bytes because file uploads are `multipart/form-data`;
//! every other body is an ASCII form encoding.

use crate::error::ApiError;

/// Header carrying the API token on every request.
pub const TOKEN_HEADER: &str = "X-ChatWorkToken";

/// Content type for form-encoded request bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The body as text, when it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        self.body
            .as_deref()
            .and_then(|body| std::str::from_utf8(body).ok())
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Quota headers Chatwork attaches to API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// Epoch second at which the quota refills.
    pub reset: Option<u64>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Parse the `X-RateLimit-*` headers. `None` when none are present.
    pub fn rate_limit(&self) -> Option<RateLimit> {
        let limit = self
            .header("x-ratelimit-limit")
            .and_then(|v| v.trim().parse().ok());
        let remaining = self
            .header("x-ratelimit-remaining")
            .and_then(|v| v.trim().parse().ok());
        let reset = self
            .header("x-ratelimit-reset")
            .and_then(|v| v.trim().parse().ok());
        if limit.is_none() && remaining.is_none() && reset.is_none() {
            return None;
        }
        Some(RateLimit {
            limit,
            remaining,
            reset,
        })
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// The host's synchronous fetch primitive.
///
/// Implementations execute exactly one request and return the response as
/// data, including 4xx/5xx statuses; only failures to obtain a response at
/// all become `ApiError::Transport`.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}
