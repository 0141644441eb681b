//! Startup configuration assembly.
//!
//! Config file (optional) → command-line overrides → validation.

use std::net::SocketAddr;
use std::path::Path;

use crate::config::loader::read_config;
use crate::config::validation::validate_config;
use crate::config::{BackendConfig, ProxyConfig};
use crate::error::ConfigError;

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub backends: Vec<String>,
    pub log_level: Option<String>,
}

/// Build the validated startup configuration.
pub fn build_config(path: Option<&Path>, overrides: Overrides) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(port) = overrides.port {
        config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
            Ok(mut addr) => {
                addr.set_port(port);
                addr.to_string()
            }
            Err(_) => format!("0.0.0.0:{}", port),
        };
    }
    config
        .backends
        .extend(overrides.backends.into_iter().map(BackendConfig::new));
    if let Some(level) = overrides.log_level {
        config.observability.log_level = level;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_overrides_without_file() {
        let config = build_config(
            None,
            Overrides {
                port: Some(9100),
                backends: vec!["http://127.0.0.1:3001".into(), "http://127.0.0.1:3002".into()],
                log_level: Some("debug".into()),
            },
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:9100");
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_no_backends_is_fatal() {
        let err = build_config(None, Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_file_then_overrides() {
        let path = std::env::temp_dir().join(format!("rr-proxy-startup-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[listener]\nbind_address = \"127.0.0.1:7000\"\n\n[[backends]]\naddress = \"http://10.0.0.1:80\"\n"
        )
        .unwrap();

        let config = build_config(
            Some(&path),
            Overrides {
                port: Some(7001),
                backends: vec!["http://10.0.0.2:80".into()],
                log_level: None,
            },
        )
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:7001");
        let addresses: Vec<_> = config.backends.iter().map(|b| b.address.as_str()).collect();
        assert_eq!(addresses, vec!["http://10.0.0.1:80", "http://10.0.0.2:80"]);
    }
}
