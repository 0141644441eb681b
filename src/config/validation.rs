//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend addresses (absolute http/https URLs with a host)
//! - Validate value ranges (timeouts > 0, thresholds >= 1)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Parse a backend address into a base URL.
///
/// Only absolute `http`/`https` URLs with a host are accepted.
pub fn parse_backend_url(address: &str) -> Result<Url, String> {
    let url = Url::parse(address).map_err(|e| format!("invalid URL {:?}: {}", address, e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme {:?} in {:?}", other, address)),
    }
    if matches!(url.host_str(), None | Some("")) {
        return Err(format!("missing host in {:?}", address));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(format!("query or fragment not allowed in {:?}", address));
    }

    Ok(url)
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address {:?}", config.listener.bind_address),
        ));
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::new("backends", "must not be empty"));
    }
    for (i, backend) in config.backends.iter().enumerate() {
        if let Err(message) = parse_backend_url(&backend.address) {
            errors.push(ValidationError::new(format!("backends[{}].address", i), message));
        }
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.backend_secs", timeouts.backend_secs),
        ("timeouts.request_secs", timeouts.request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }
    if timeouts.request_secs < timeouts.backend_secs {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            format!("must be at least timeouts.backend_secs ({})", timeouts.backend_secs),
        ));
    }

    let health = &config.health_check;
    if health.enabled {
        if health.interval_secs == 0 {
            errors.push(ValidationError::new("health_check.interval_secs", "must be greater than 0"));
        }
        if health.timeout_secs == 0 {
            errors.push(ValidationError::new("health_check.timeout_secs", "must be greater than 0"));
        }
        if health.unhealthy_threshold == 0 {
            errors.push(ValidationError::new("health_check.unhealthy_threshold", "must be at least 1"));
        }
        if health.healthy_threshold == 0 {
            errors.push(ValidationError::new("health_check.healthy_threshold", "must be at least 1"));
        }
        if !health.path.starts_with('/') {
            errors.push(ValidationError::new("health_check.path", "must start with '/'"));
        }
    }

    // Only the health monitor ever revives a backend.
    if config.dispatch.mark_dead_on_failure && !health.enabled {
        errors.push(ValidationError::new(
            "dispatch.mark_dead_on_failure",
            "requires health_check.enabled",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
