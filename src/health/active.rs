//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends
//! - Update backend liveness based on results

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request};
use futures_util::future::join_all;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::validation::parse_backend_url;
use crate::config::{HealthCheckConfig, HealthCheckMode};
use crate::health::state::{HealthState, Transition};
use crate::load_balancer::backend::{build_client, HttpClient};
use crate::load_balancer::{Backend, BackendPool};
use crate::observability::metrics;

pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    config: HealthCheckConfig,
    client: HttpClient,
    states: Vec<HealthState>,
}

impl HealthMonitor {
    pub fn new(pool: Arc<BackendPool>, config: HealthCheckConfig) -> Self {
        let client = build_client(Duration::from_secs(config.timeout_secs));
        let states = vec![HealthState::new(); pool.len()];

        Self {
            pool,
            config,
            client,
            states,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            mode = ?self.config.mode,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once, concurrently, and apply the results.
    pub async fn check_all(&mut self) {
        let pool = self.pool.clone();
        let backends = pool.backends();

        let results = join_all(backends.iter().map(|b| self.probe(b.as_ref()))).await;

        for ((backend, state), healthy) in backends.iter().zip(self.states.iter_mut()).zip(results) {
            let alive = backend.is_alive();
            let transition = if healthy {
                state.mark_success(alive, self.config.healthy_threshold)
            } else {
                state.mark_failure(alive, self.config.unhealthy_threshold)
            };

            match transition {
                Some(Transition::BecameAlive) => {
                    backend.set_alive(true);
                    tracing::info!(backend = %backend.address(), "Backend is alive again");
                }
                Some(Transition::BecameDead) => {
                    backend.set_alive(false);
                    tracing::warn!(backend = %backend.address(), "Backend marked dead");
                }
                None => {}
            }

            metrics::record_backend_health(backend.name(), backend.is_alive());
        }

        tracing::debug!(
            alive = pool.alive_count(),
            total = pool.len(),
            "Health check round complete"
        );
    }

    async fn probe(&self, backend: &dyn Backend) -> bool {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        match self.config.mode {
            HealthCheckMode::Http => self.probe_http(backend.address(), timeout).await,
            HealthCheckMode::Tcp => probe_tcp(backend.address(), timeout).await,
        }
    }

    async fn probe_http(&self, address: &str, timeout: Duration) -> bool {
        let uri = format!("{}{}", address.trim_end_matches('/'), self.config.path);

        let request = match Request::builder()
            .method("GET")
            .uri(uri.as_str())
            .header(header::USER_AGENT, "rr-proxy-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(uri = %uri, error = %e, "Failed to build health check request");
                return false;
            }
        };

        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(addr = %address, status = %response.status(), "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(addr = %address, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(addr = %address, "Health check failed: timeout");
                false
            }
        }
    }
}

async fn probe_tcp(address: &str, timeout: Duration) -> bool {
    let target = parse_backend_url(address).ok().and_then(|url| {
        let host = url.host_str()?.trim_matches(|c| c == '[' || c == ']').to_string();
        Some((host, url.port_or_known_default()?))
    });
    let Some((host, port)) = target else {
        tracing::error!(addr = %address, "Cannot derive host and port for TCP health check");
        return false;
    };

    match time::timeout(timeout, TcpStream::connect((host.as_str(), port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::debug!(addr = %address, error = %e, "Health check failed: connect error");
            false
        }
        Err(_) => {
            tracing::debug!(addr = %address, "Health check failed: timeout");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::config::ProxyConfig;
    use axum::{http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn spawn_health_endpoint(status: StatusCode) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/health", get(move || async move { status }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn refused_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    fn pool(addrs: &[SocketAddr]) -> Arc<BackendPool> {
        let mut config = ProxyConfig::default();
        for addr in addrs {
            config.backends.push(BackendConfig::new(format!("http://{}", addr)));
        }
        Arc::new(BackendPool::from_config(&config).unwrap())
    }

    fn health_config(mode: HealthCheckMode, unhealthy: u32, healthy: u32) -> HealthCheckConfig {
        HealthCheckConfig {
            enabled: true,
            mode,
            timeout_secs: 1,
            unhealthy_threshold: unhealthy,
            healthy_threshold: healthy,
            ..HealthCheckConfig::default()
        }
    }

    #[tokio::test]
    async fn test_http_probe_marks_failing_backends_dead() {
        let ok = spawn_health_endpoint(StatusCode::OK).await;
        let erroring = spawn_health_endpoint(StatusCode::INTERNAL_SERVER_ERROR).await;
        let refused = refused_addr().await;
        let pool = pool(&[ok, erroring, refused]);

        let mut monitor = HealthMonitor::new(pool.clone(), health_config(HealthCheckMode::Http, 1, 1));
        monitor.check_all().await;

        let alive: Vec<_> = pool.backends().iter().map(|b| b.is_alive()).collect();
        assert_eq!(alive, vec![true, false, false]);
    }

    #[tokio::test]
    async fn test_threshold_delays_eviction() {
        let refused = refused_addr().await;
        let pool = pool(&[refused]);

        let mut monitor = HealthMonitor::new(pool.clone(), health_config(HealthCheckMode::Http, 2, 1));
        monitor.check_all().await;
        assert!(pool.backends()[0].is_alive());
        monitor.check_all().await;
        assert!(!pool.backends()[0].is_alive());
    }

    #[tokio::test]
    async fn test_probe_revives_dead_backend() {
        let ok = spawn_health_endpoint(StatusCode::OK).await;
        let pool = pool(&[ok]);
        pool.backends()[0].set_alive(false);

        let mut monitor = HealthMonitor::new(pool.clone(), health_config(HealthCheckMode::Http, 1, 2));
        monitor.check_all().await;
        assert!(!pool.backends()[0].is_alive());
        monitor.check_all().await;
        assert!(pool.backends()[0].is_alive());
    }

    #[tokio::test]
    async fn test_tcp_probe() {
        let listening = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listening.local_addr().unwrap();
        let refused = refused_addr().await;
        let pool = pool(&[open, refused]);

        let mut monitor = HealthMonitor::new(pool.clone(), health_config(HealthCheckMode::Tcp, 1, 1));
        monitor.check_all().await;

        assert!(pool.backends()[0].is_alive());
        assert!(!pool.backends()[1].is_alive());
        drop(listening);
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let ok = spawn_health_endpoint(StatusCode::OK).await;
        let monitor = HealthMonitor::new(pool(&[ok]), health_config(HealthCheckMode::Http, 1, 1));
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(monitor.run(rx));
        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
