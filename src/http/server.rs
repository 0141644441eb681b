//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all proxy handler
//! - Wire up middleware (tracing, request timeout, request ID)
//! - Spawn the health monitor when enabled
//! - Serve until shutdown is signalled

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::error::ConfigError;
use crate::health::active::HealthMonitor;
use crate::http::dispatcher::Dispatcher;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::load_balancer::BackendPool;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

/// HTTP entrypoint for the balancer.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pool: Arc<BackendPool>,
}

impl HttpServer {
    /// Create a server whose pool is built from `config.backends`.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let pool = Arc::new(BackendPool::from_config(&config)?);
        Ok(Self::with_pool(config, pool))
    }

    fn with_pool(config: ProxyConfig, pool: Arc<BackendPool>) -> Self {
        let state = AppState {
            dispatcher: Dispatcher::new(pool.clone(), config.dispatch.clone()),
        };
        let router = Self::build_router(&config, state);
        Self { router, config, pool }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer())
                    .layer(TimeoutLayer::new(config.timeouts.request())),
            )
    }

    /// Run the server on `listener` until `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;

        if self.config.health_check.enabled {
            let monitor = HealthMonitor::new(self.pool.clone(), self.config.health_check.clone());
            let monitor_shutdown = shutdown.subscribe();
            tokio::spawn(async move {
                monitor.run(monitor_shutdown).await;
            });
        }

        let mut server_shutdown = shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        tracing::info!(
            address = %addr,
            backends = self.pool.len(),
            "Serving requests"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all proxy handler; every path and method is dispatched the same way.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    state.dispatcher.handle(request, Some(client_addr)).await
}
