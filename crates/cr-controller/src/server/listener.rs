//! Duplex TCP listener
//!
//! Accepts incoming agent connections and spawns a handler for each.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::server::handler::handle_connection;
use crate::state::ControllerState;

/// TCP server accepting persistent agent connections
pub struct DuplexServer {
    /// Shared controller state
    state: Arc<ControllerState>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl DuplexServer {
    /// Create a new duplex server
    pub fn new(state: Arc<ControllerState>, cancel: CancellationToken) -> Self {
        Self { state, cancel }
    }

    /// Bind the given address and run until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind duplex server to {}", bind_addr))?;
        self.run_on(listener).await
    }

    /// Run the accept loop on an already-bound listener.
    ///
    /// Separate from `run` so tests can bind an ephemeral port first and
    /// learn the address before the server starts.
    pub async fn run_on(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("Duplex server listening on {}", local_addr);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Duplex server shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => {
                            if let Some(max) = self.state.config.max_connections {
                                if self.state.connections.len() >= max as usize {
                                    tracing::warn!(
                                        "Connection limit {} reached, dropping {}",
                                        max,
                                        peer_addr
                                    );
                                    continue;
                                }
                            }

                            tracing::info!("New agent connection from {}", peer_addr);
                            let state = Arc::clone(&self.state);
                            // Child token: global shutdown cancels every
                            // connection, and the pool can cancel one.
                            let cancel = self.cancel.child_token();
                            tokio::spawn(async move {
                                handle_connection(socket, peer_addr, state, cancel).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
