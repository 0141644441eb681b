//! Backend pool management.
//!
//! # Responsibilities
//! - Own the fixed, ordered list of backends
//! - Apply round-robin selection among live backends
//! - Expose backends to the health monitor

use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::error::{ConfigError, NoAvailableBackend};
use crate::load_balancer::{
    backend::{build_client, Backend, HttpBackend},
    round_robin::RoundRobin,
};

/// Fixed-size pool of backends with a round-robin cursor.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<dyn Backend>>,
    selector: RoundRobin,
}

impl BackendPool {
    /// Create a pool over `backends`, which must not be empty.
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Result<Self, ConfigError> {
        if backends.is_empty() {
            return Err(ConfigError::EmptyPool);
        }
        Ok(Self {
            backends,
            selector: RoundRobin::new(),
        })
    }

    /// Build `HttpBackend`s for every configured address, sharing one client.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let client = build_client(config.timeouts.connect());

        let backends = config
            .backends
            .iter()
            .map(|backend| {
                HttpBackend::new(backend, client.clone(), config.timeouts.backend())
                    .map(|b| Arc::new(b) as Arc<dyn Backend>)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pool = Self::new(backends)?;
        tracing::info!(
            backends = pool.len(),
            addresses = ?pool.backends.iter().map(|b| b.address()).collect::<Vec<_>>(),
            "Backend pool created"
        );
        Ok(pool)
    }

    /// Select the next live backend in round-robin order.
    pub fn next(&self) -> Result<Arc<dyn Backend>, NoAvailableBackend> {
        match self.selector.select(&self.backends, |b| b.is_alive()) {
            Some(index) => Ok(self.backends[index].clone()),
            None => {
                tracing::debug!(backend_count = self.backends.len(), "No live backends found in pool");
                Err(NoAvailableBackend)
            }
        }
    }

    /// All backends in configuration order (for health checking).
    pub fn backends(&self) -> &[Arc<dyn Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Always false; a pool cannot be constructed empty.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_alive()).count()
    }
}
