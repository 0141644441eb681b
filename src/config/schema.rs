//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream backends, in round-robin order.
    pub backends: Vec<BackendConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Failure policy of the dispatcher.
    pub dispatch: DispatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base URL of the backend (e.g., "http://127.0.0.1:3000").
    pub address: String,

    /// Optional label for logs; defaults to the address.
    #[serde(default)]
    pub name: Option<String>,
}

impl BackendConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for a backend to return a response head, in seconds.
    pub backend_secs: u64,

    /// Total time allowed for an inbound request, in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn backend(&self) -> Duration {
        Duration::from_secs(self.backend_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            backend_secs: 30,
            request_secs: 60,
        }
    }
}

/// Probe protocol used by the health monitor.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckMode {
    /// `GET {address}{path}`, healthy on 2xx.
    #[default]
    Http,
    /// Plain TCP connect to the backend host and port.
    Tcp,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Probe protocol.
    pub mode: HealthCheckMode,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Number of consecutive failures before marking dead.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking alive.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: HealthCheckMode::Http,
            path: "/health".to_string(),
            interval_secs: 10,
            timeout_secs: 2,
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// What the dispatcher does when a forward fails.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Retry once against a different backend.
    pub retry_on_failure: bool,

    /// Mark the failing backend dead until a health probe revives it.
    pub mark_dead_on_failure: bool,

    /// Largest request body buffered so that it can be replayed on retry.
    pub max_replay_body_bytes: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry_on_failure: false,
            mark_dead_on_failure: false,
            max_replay_body_bytes: 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
