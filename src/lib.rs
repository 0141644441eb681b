//! Round-robin reverse proxy load balancer.
//!
//! Inbound HTTP requests are dispatched to a fixed pool of upstream backends
//! in round-robin order, skipping backends currently marked dead.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use error::{ConfigError, DispatchError, NoAvailableBackend, ProxyError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Backend, BackendPool, HttpBackend};
