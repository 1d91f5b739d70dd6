//! Synchronous API client core for the Chatwork v2 REST API.
//!
//! # Overview
//! Builds `HttpRequest` values and maps `HttpResponse` values without
//! owning any network I/O (host-does-IO pattern). The host supplies a
//! `Transport`, or executes `Call::request` itself and hands the response
//! to `Call::parse`.
//!
//! # Design
//! - `ChatworkClient` is stateless: an immutable token and base URL.
//! - Each endpoint is a `build_*` method that validates parameters first, so
//!   a local error means no request was ever produced.
//! - HTTP statuses map onto `ApiError` in one place (`error::classify`).
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod encode;
pub mod error;
pub mod http;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod types;
pub mod validate;

pub use client::{Call, ChatworkClient, DEFAULT_BASE_URL};
pub use config::{ClientConfig, ConfigError};
pub use encode::{AccountIds, Deadline};
pub use error::{ApiError, Resource};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RateLimit, Transport};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::*;
