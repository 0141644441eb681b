//! Error taxonomy for the balancer.
//!
//! - `ConfigError`: fatal at startup, the process never begins serving.
//! - `NoAvailableBackend`: per-request, surfaced as 503.
//! - `ProxyError`: per-request, surfaced as 502 (504 on timeout).

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// A pool was built without any backends.
    #[error("backend pool must contain at least one backend")]
    EmptyPool,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A full scan of the pool found no live backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no available backend")]
pub struct NoAvailableBackend;

/// A chosen backend failed to produce a response.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No response head arrived within the backend timeout.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused, reset, or malformed upstream response.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// The outbound request could not be built.
    #[error("invalid upstream request: {0}")]
    InvalidRequest(#[from] axum::http::Error),
}

impl ProxyError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProxyError::Timeout(_))
    }
}

/// Per-request failure of the dispatch path.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    NoAvailableBackend(#[from] NoAvailableBackend),

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl DispatchError {
    /// Status code returned to the client for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::NoAvailableBackend(_) => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Proxy(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::Proxy(_) => StatusCode::BAD_GATEWAY,
        }
    }
}
