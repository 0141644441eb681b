//! In-memory backends for unit tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};

use crate::error::ProxyError;
use crate::load_balancer::Backend;

/// Answers every request with its own address as the body, or fails.
#[derive(Debug)]
pub struct StaticBackend {
    address: String,
    alive: AtomicBool,
    failing: bool,
    pub hits: AtomicUsize,
}

impl StaticBackend {
    pub fn new(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            alive: AtomicBool::new(true),
            failing: false,
            hits: AtomicUsize::new(0),
        })
    }

    pub fn dead(address: &str) -> Arc<Self> {
        let backend = Self::new(address);
        backend.set_alive(false);
        backend
    }

    /// Alive, but every forward times out.
    pub fn failing(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            alive: AtomicBool::new(true),
            failing: true,
            hits: AtomicUsize::new(0),
        })
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for StaticBackend {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    async fn forward(
        &self,
        _request: Request<Body>,
        _client_addr: Option<SocketAddr>,
    ) -> Result<Response<Body>, ProxyError> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ProxyError::Timeout(Duration::from_millis(1)));
        }
        Ok(Response::new(Body::from(self.address.clone())))
    }
}
