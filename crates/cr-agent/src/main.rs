//! c-Relay client agent
//!
//! Connects out to the controller from inside the private network,
//! executes relayed tasks, and reports results.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cr_agent::duplex::DuplexClient;
use cr_agent::exec::ExecutionEngine;
use cr_agent::poll::PollingClient;
use cr_agent::tunnel::{run_reaper, TunnelBroker};
use cr_core::config::{self, AgentConfig};
use cr_core::identity;
use cr_core::types::TransportKind;

#[derive(Parser)]
#[command(name = "cr-agent")]
#[command(about = "c-Relay client agent")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Controller duplex address (overrides config)
    #[arg(long)]
    controller: Option<String>,

    /// Controller HTTP base URL (overrides config)
    #[arg(long)]
    http_url: Option<String>,

    /// Transport: duplex (default) or polling (deprecated)
    #[arg(long)]
    transport: Option<String>,

    /// Path to the identity file (overrides config)
    #[arg(long)]
    identity: Option<PathBuf>,

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

    tracing::info!("c-Relay agent starting...");

    let mut config: AgentConfig = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                AgentConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            AgentConfig::default()
        }
    };

    if let Some(controller) = args.controller {
        config.controller_duplex_addr = controller;
    }
    if let Some(http_url) = args.http_url {
        config.controller_http_url = http_url;
    }
    if let Some(identity_path) = args.identity {
        config.identity_path = identity_path;
    }
    if let Some(transport) = args.transport {
        config.transport = match transport.as_str() {
            "duplex" => TransportKind::Duplex,
            "polling" => TransportKind::Polling,
            other => bail!("unknown transport '{}' (expected duplex or polling)", other),
        };
    }

    let agent_id = identity::load_or_create(&config.identity_path)
        .with_context(|| format!("Failed to load identity from {:?}", config.identity_path))?;
    tracing::info!("Agent identity: {}", agent_id);

    let broker = Arc::new(TunnelBroker::new(
        config.tunnel_open_timeout,
        config.tunnel_idle_timeout,
    ));
    let executor = Arc::new(ExecutionEngine::new(&config, Arc::clone(&broker)));

    let cancel = CancellationToken::new();

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

    // Idle tunnels are reaped independently of task execution
    tokio::spawn(run_reaper(Arc::clone(&broker), cancel.clone()));

    match config.transport {
        TransportKind::Duplex => {
            let client = DuplexClient::new(config.clone(), agent_id, executor);
            client.run(cancel).await?;
        }
        TransportKind::Polling => {
            tracing::warn!("Polling transport is deprecated; prefer duplex");
            let client = PollingClient::new(config.clone(), agent_id, executor);
            client.run(cancel).await?;
        }
    }

    tracing::info!("Agent shutdown complete");
    Ok(())
}
