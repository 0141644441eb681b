//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track liveness (defaults to alive, flipped by health checks)
//! - Forward a request to the upstream and hand back its response

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, Version};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::validation::{parse_backend_url, ValidationError};
use crate::config::BackendConfig;
use crate::error::{ConfigError, ProxyError};
use crate::http::headers;

/// Shared outbound HTTP(S) client; owns upstream connection reuse.
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build the outbound client used by every `HttpBackend`.
pub fn build_client(connect_timeout: Duration) -> HttpClient {
    let mut http = HttpConnector::new();
    http.set_connect_timeout(Some(connect_timeout));
    http.enforce_http(false);

    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new()).build(https)
}

/// One upstream server capable of answering proxied requests.
#[async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Immutable upstream identifier.
    fn address(&self) -> &str;

    /// Label for logs and metrics.
    fn name(&self) -> &str {
        self.address()
    }

    fn is_alive(&self) -> bool;

    /// Liveness-mutation entry point for health checks and failure policy.
    fn set_alive(&self, alive: bool);

    /// Proxy `request` to this backend and return its response.
    async fn forward(
        &self,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Response<Body>, ProxyError>;
}

/// A plain HTTP or HTTPS upstream.
pub struct HttpBackend {
    address: String,
    name: String,
    base_url: Url,
    upstream_authority: String,
    alive: AtomicBool,
    client: HttpClient,
    timeout: Duration,
}

impl HttpBackend {
    /// Create a backend for `config.address`.
    ///
    /// `timeout` bounds the wait for the upstream response head.
    pub fn new(config: &BackendConfig, client: HttpClient, timeout: Duration) -> Result<Self, ConfigError> {
        let base_url = parse_backend_url(&config.address).map_err(|message| {
            ConfigError::Validation(vec![ValidationError::new("backends.address", message)])
        })?;

        Ok(Self {
            address: config.address.clone(),
            name: config.label().to_string(),
            upstream_authority: headers::authority(&base_url),
            base_url,
            alive: AtomicBool::new(true),
            client,
            timeout,
        })
    }
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("address", &self.address)
            .field("name", &self.name)
            .field("alive", &self.is_alive())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn address(&self) -> &str {
        &self.address
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    async fn forward(
        &self,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Response<Body>, ProxyError> {
        let (mut parts, body) = request.into_parts();

        let original_host = parts
            .headers
            .get(header::HOST)
            .cloned()
            .or_else(|| parts.uri.authority().and_then(|a| a.as_str().parse().ok()));

        parts.uri = headers::upstream_uri(&self.base_url, &parts.uri)
            .map_err(axum::http::Error::from)?;
        // The client negotiates the upstream protocol itself.
        parts.version = Version::HTTP_11;
        headers::rewrite_request_headers(
            &mut parts.headers,
            original_host,
            client_addr,
            &self.upstream_authority,
        );

        let upstream = self.client.request(Request::from_parts(parts, body));
        let response = match tokio::time::timeout(self.timeout, upstream).await {
            Ok(result) => result?,
            Err(_) => return Err(ProxyError::Timeout(self.timeout)),
        };

        let (mut parts, body) = response.into_parts();
        headers::strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Request as AxumRequest, http::StatusCode, Router};
    use std::time::Instant;
    use tokio::net::TcpListener;

    async fn echo(request: AxumRequest) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let host = parts.headers.get(header::HOST).cloned().unwrap();
        Response::builder()
            .header("x-echo-method", parts.method.as_str())
            .header("x-echo-path", parts.uri.path())
            .header("x-echo-host", host)
            .header(header::CONNECTION, "close")
            .body(Body::from(bytes))
            .unwrap()
    }

    async fn spawn_echo() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().fallback(echo)).await.unwrap();
        });
        addr
    }

    fn backend(address: String, timeout: Duration) -> HttpBackend {
        let client = build_client(Duration::from_secs(1));
        HttpBackend::new(&BackendConfig::new(address), client, timeout).unwrap()
    }

    #[test]
    fn test_rejects_invalid_address() {
        let client = build_client(Duration::from_secs(1));
        let err = HttpBackend::new(&BackendConfig::new("localhost:3000"), client, Duration::from_secs(1));
        assert!(matches!(err, Err(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_alive_by_default_and_settable() {
        let b = backend("http://127.0.0.1:1".into(), Duration::from_secs(1));
        assert!(b.is_alive());
        b.set_alive(false);
        assert!(!b.is_alive());
        assert_eq!(b.address(), "http://127.0.0.1:1");
        assert_eq!(b.name(), "http://127.0.0.1:1");
    }

    #[tokio::test]
    async fn test_forward_round_trips_body() {
        let addr = spawn_echo().await;
        let b = backend(format!("http://{}/base", addr), Duration::from_secs(5));

        let request = Request::builder()
            .method("POST")
            .uri("/items?x=1")
            .header(header::HOST, "lb.local")
            .body(Body::from("hello upstream"))
            .unwrap();

        let response = b.forward(request, Some("10.1.2.3:4000".parse().unwrap())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-echo-method"], "POST");
        assert_eq!(response.headers()["x-echo-path"], "/base/items");
        assert_eq!(response.headers()["x-echo-host"], addr.to_string().as_str());
        assert!(!response.headers().contains_key(header::CONNECTION));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello upstream");
    }

    #[tokio::test]
    async fn test_forward_unreachable_is_proxy_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let b = backend(format!("http://{}", addr), Duration::from_secs(5));
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let err = b.forward(request, None).await.unwrap_err();
        assert!(matches!(err, ProxyError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_forward_times_out_on_silent_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let b = backend(format!("http://{}", addr), Duration::from_millis(200));
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let start = Instant::now();
        let err = b.forward(request, None).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
