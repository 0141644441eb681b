//! Per-request dispatch: select a backend, forward, respond.
//!
//! # Failure policy
//! - No live backend: 503, no upstream call
//! - Forward failed: 502 (504 on timeout)
//! - Optional: mark the failed backend dead
//! - Optional: retry exactly once on a different backend, only when the
//!   request body was small enough to buffer for replay

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{request::Parts, Request, Response, StatusCode};
use axum::response::IntoResponse;

use crate::config::DispatchConfig;
use crate::error::{DispatchError, ProxyError};
use crate::http::request;
use crate::load_balancer::{Backend, BackendPool};
use crate::observability::metrics;

/// Shared dispatch engine, injected into the HTTP handler.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool: Arc<BackendPool>,
    policy: DispatchConfig,
}

impl Dispatcher {
    pub fn new(pool: Arc<BackendPool>, policy: DispatchConfig) -> Self {
        Self { pool, policy }
    }

    /// Proxy one inbound request. Never fails; errors become status codes.
    pub async fn handle(&self, request: Request<Body>, client_addr: Option<SocketAddr>) -> Response<Body> {
        let start_time = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let request_id = request::request_id(&request).unwrap_or("unknown").to_string();

        let backend = match self.pool.next() {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(request_id = %request_id, method = %method, path = %path, "No live backend available");
                metrics::record_no_backend();
                let err = DispatchError::from(e);
                metrics::record_request(method.as_str(), err.status_code().as_u16(), "none", start_time);
                return error_response(&err);
            }
        };

        let (parts, body) = request.into_parts();
        let (first, replay) = if self.policy.retry_on_failure && fits(&body, self.policy.max_replay_body_bytes) {
            match axum::body::to_bytes(body, self.policy.max_replay_body_bytes).await {
                Ok(bytes) => (rebuild(&parts, bytes.clone()), Some((parts, bytes))),
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
                    return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
                }
            }
        } else {
            (Request::from_parts(parts, body), None)
        };

        let mut outcome = self.forward(&backend, first, client_addr, &request_id).await;

        if outcome.is_err() {
            let retry = replay.and_then(|replay| Some((replay, self.retry_target(&backend)?)));
            if let Some(((parts, bytes), retry_backend)) = retry {
                tracing::info!(
                    request_id = %request_id,
                    failed = %backend.address(),
                    retry = %retry_backend.address(),
                    "Retrying on a different backend"
                );
                outcome = self
                    .forward(&retry_backend, rebuild(&parts, bytes), client_addr, &request_id)
                    .await;
            }
        }

        match outcome {
            Ok((backend, response)) => {
                metrics::record_request(method.as_str(), response.status().as_u16(), backend.name(), start_time);
                response
            }
            Err((backend, e)) => {
                let err = DispatchError::from(e);
                tracing::error!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    backend = %backend.address(),
                    error = %err,
                    "Upstream error"
                );
                metrics::record_request(method.as_str(), err.status_code().as_u16(), backend.name(), start_time);
                error_response(&err)
            }
        }
    }

    /// Forward to `backend`, applying the failure policy on error.
    async fn forward(
        &self,
        backend: &Arc<dyn Backend>,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
        request_id: &str,
    ) -> Result<(Arc<dyn Backend>, Response<Body>), (Arc<dyn Backend>, ProxyError)> {
        tracing::info!(
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            backend = %backend.address(),
            "Forwarding request"
        );

        match backend.forward(request, client_addr).await {
            Ok(response) => Ok((backend.clone(), response)),
            Err(e) => {
                if self.policy.mark_dead_on_failure && backend.is_alive() {
                    backend.set_alive(false);
                    metrics::record_backend_health(backend.name(), false);
                    tracing::warn!(backend = %backend.address(), error = %e, "Marking backend dead after failed forward");
                }
                Err((backend.clone(), e))
            }
        }
    }

    /// Next live backend, unless it is the one that just failed.
    fn retry_target(&self, failed: &Arc<dyn Backend>) -> Option<Arc<dyn Backend>> {
        let candidate = self.pool.next().ok()?;
        if Arc::ptr_eq(&candidate, failed) {
            None
        } else {
            Some(candidate)
        }
    }
}

/// True when the body is known to be at most `limit` bytes.
fn fits(body: &Body, limit: usize) -> bool {
    body.size_hint()
        .upper()
        .is_some_and(|upper| upper <= limit as u64)
}

fn rebuild(parts: &Parts, body: Bytes) -> Request<Body> {
    let mut request = Request::new(Body::from(body));
    *request.method_mut() = parts.method.clone();
    *request.uri_mut() = parts.uri.clone();
    *request.version_mut() = parts.version;
    *request.headers_mut() = parts.headers.clone();
    request
}

fn error_response(err: &DispatchError) -> Response<Body> {
    let message = match err {
        DispatchError::NoAvailableBackend(_) => "No available backend",
        DispatchError::Proxy(ProxyError::Timeout(_)) => "Upstream request timed out",
        DispatchError::Proxy(_) => "Upstream request failed",
    };
    (err.status_code(), message).into_response()
}
