//! rr-proxy: round-robin reverse proxy load balancer.
//!
//! ```text
//! Client ──▶ listener ──▶ dispatcher ──▶ pool (round-robin, live only) ──▶ backend ──▶ Upstream
//!                                                    ▲
//!                                      health monitor (optional)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use rr_proxy::lifecycle::{signals, startup};
use rr_proxy::observability::{logging, metrics};
use rr_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "rr-proxy")]
#[command(about = "Round-robin reverse proxy load balancer", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides listener.bind_address port).
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend base URL; may be repeated.
    #[arg(short = 'b', long = "backend")]
    backends: Vec<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let overrides = startup::Overrides {
        port: cli.port,
        backends: cli.backends,
        log_level: cli.log_level,
    };
    let config = match startup::build_config(cli.config.as_deref(), overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(&config.observability.log_level) {
        eprintln!("error: failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!("rr-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        health_checks = config.health_check.enabled,
        backend_timeout_secs = config.timeouts.backend_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let started = config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .map_err(|e| e.to_string())
            .and_then(|addr| metrics::init_metrics(addr).map_err(|e| e.to_string()));
        if let Err(e) = started {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to start metrics endpoint"
            );
            return ExitCode::FAILURE;
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let server = match HttpServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build backend pool");
            return ExitCode::FAILURE;
        }
    };

    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_address, error = %e, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    if let Err(e) = server.run(listener, shutdown).await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
