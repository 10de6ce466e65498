//! c-Relay controller daemon
//!
//! Accepts persistent duplex connections from remote agents, serves the
//! HTTP API, and runs the registry sweeper.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cr_core::config::{self, ControllerConfig};
use cr_controller::http;
use cr_controller::registry::run_sweeper;
use cr_controller::server::DuplexServer;
use cr_controller::ControllerState;

#[derive(Parser)]
#[command(name = "cr-controller")]
#[command(about = "c-Relay controller daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Duplex bind address (overrides config)
    #[arg(long)]
    bind_duplex: Option<String>,

    /// HTTP bind address (overrides config)
    #[arg(long)]
    bind_http: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("c-Relay controller starting...");

    // Load configuration
    let config = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                ControllerConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            ControllerConfig::default()
        }
    };

    let mut config = config;
    if let Some(bind) = args.bind_duplex {
        config.bind_duplex = bind;
    }
    if let Some(bind) = args.bind_http {
        config.bind_http = bind;
    }

    let state = ControllerState::new(config);

    // Cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    // Registry sweeper runs independently of request handling
    tokio::spawn(run_sweeper(Arc::clone(&state), cancel.clone()));

    // HTTP API
    let http_listener = tokio::net::TcpListener::bind(&state.config.bind_http)
        .await
        .with_context(|| format!("Failed to bind HTTP API to {}", state.config.bind_http))?;
    tracing::info!("HTTP API listening on {}", http_listener.local_addr()?);

    let http_router = http::router(Arc::clone(&state));
    let http_cancel = cancel.clone();
    tokio::spawn(async move {
        let result = axum::serve(http_listener, http_router)
            .with_graceful_shutdown(async move { http_cancel.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    // Duplex server runs in the foreground
    let bind_duplex = state.config.bind_duplex.clone();
    let server = DuplexServer::new(Arc::clone(&state), cancel.clone());
    server.run(&bind_duplex).await?;

    tracing::info!("Controller shutdown complete");
    Ok(())
}
