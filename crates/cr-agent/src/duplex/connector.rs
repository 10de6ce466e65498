//! Duplex connection lifecycle
//!
//! Per-connection state machine from the agent's side:
//! Connecting -> Registered -> Active -> Closed. Commands are executed
//! one at a time, in arrival order; a slow command delays the next one
//! for this agent, which keeps the protocol free of per-task flow
//! control. Reconnection after close is a fresh session under the same
//! persisted identity, so queued tasks keep their affinity.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use cr_core::config::AgentConfig;
use cr_core::error::TransportError;
use cr_core::traits::TaskExecutor;
use cr_core::types::AgentId;
use cr_protocol::{Frame, FrameCodec, Message, PROTOCOL_VERSION};

use super::reconnect::ExponentialBackoff;

/// Why an active session ended
enum SessionEnd {
    /// Connection dropped; reconnect
    Lost,
    /// Shutdown requested; stop for good
    Cancelled,
}

/// Maintains the duplex connection to the controller
pub struct DuplexClient {
    config: AgentConfig,
    agent_id: AgentId,
    executor: Arc<dyn TaskExecutor>,
}

impl DuplexClient {
    /// Create a new client for the given persisted identity
    pub fn new(config: AgentConfig, agent_id: AgentId, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            config,
            agent_id,
            executor,
        }
    }

    /// Connect, serve, reconnect, until cancelled.
    ///
    /// Registration rejections are terminal: retrying with the same
    /// identity would be rejected again.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), TransportError> {
        let mut backoff = ExponentialBackoff::from_config(&self.config.backoff);

        loop {
            let connected = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = self.connect_and_register() => result,
            };

            let framed = match connected {
                Ok(framed) => framed,
                Err(TransportError::RegistrationRejected(reason)) => {
                    tracing::error!("Controller rejected registration: {}", reason);
                    return Err(TransportError::RegistrationRejected(reason));
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!("Connection failed: {}. Retrying in {:?}", e, delay);
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            };

            tracing::info!(
                "Connected to controller at {}",
                self.config.controller_duplex_addr
            );
            backoff.reset();

            match self.run_session(framed, &cancel).await {
                SessionEnd::Cancelled => return Ok(()),
                SessionEnd::Lost => {
                    tracing::warn!("Connection to controller lost, reconnecting");
                }
            }
        }
    }

    /// Open the TCP connection and complete the Register handshake
    async fn connect_and_register(
        &self,
    ) -> Result<Framed<TcpStream, FrameCodec>, TransportError> {
        let addr = &self.config.controller_duplex_addr;

        let socket = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::ConnectFailed(format!("connection to {} timed out", addr)))?
            .map_err(|e| TransportError::ConnectFailed(format!("{}: {}", addr, e)))?;

        let mut framed = Framed::new(socket, FrameCodec::new());

        // The stable identity is the first frame; it doubles as
        // registration on the controller side.
        let register = Frame::control(Message::Register {
            agent_id: self.agent_id.to_string(),
            hostname: gethostname::gethostname().to_string_lossy().into_owned(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            version: Some(PROTOCOL_VERSION.to_string()),
        });
        framed
            .send(register)
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("failed to register: {}", e)))?;

        let ack = tokio::time::timeout(self.config.connect_timeout, framed.next())
            .await
            .map_err(|_| TransportError::ConnectFailed("no RegisterAck within bound".to_string()))?
            .ok_or_else(|| {
                TransportError::ConnectionLost("closed during registration".to_string())
            })?
            .map_err(|e| TransportError::ConnectionLost(e.to_string()))?;

        match ack.message {
            Message::RegisterAck { accepted: true, .. } => Ok(framed),
            Message::RegisterAck {
                accepted: false,
                reason,
            } => Err(TransportError::RegistrationRejected(
                reason.unwrap_or_else(|| "no reason given".to_string()),
            )),
            other => Err(TransportError::ConnectionLost(format!(
                "expected RegisterAck, got {}",
                other.name()
            ))),
        }
    }

    /// Active state: execute pushed commands, answer heartbeats.
    async fn run_session(
        &self,
        mut framed: Framed<TcpStream, FrameCodec>,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Shutting down duplex connection");
                    return SessionEnd::Cancelled;
                }

                frame = framed.next() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => {
                            tracing::warn!("Protocol error: {}", e);
                            return SessionEnd::Lost;
                        }
                        None => return SessionEnd::Lost,
                    };

                    match frame.message {
                        // Single task in flight: the command runs to
                        // completion here before the next frame is read.
                        Message::Command { kind } => {
                            let result = self
                                .executor
                                .execute(frame.correlation_id, kind)
                                .await;
                            let reply = Frame::new(
                                frame.correlation_id,
                                Message::TaskResult(result),
                            );
                            if framed.send(reply).await.is_err() {
                                // The result is lost with the connection;
                                // the controller's caller times out on
                                // the pending correlation id.
                                return SessionEnd::Lost;
                            }
                        }

                        Message::Heartbeat { timestamp } => {
                            let ack = Frame::control(Message::HeartbeatAck { timestamp });
                            if framed.send(ack).await.is_err() {
                                return SessionEnd::Lost;
                            }
                        }

                        Message::Error { code, message } => {
                            tracing::warn!(
                                "Error frame from controller: {:?} {}",
                                code,
                                message
                            );
                        }

                        other => {
                            tracing::warn!(
                                "Unexpected {} frame from controller",
                                other.name()
                            );
                        }
                    }
                }
            }
        }
    }
}
