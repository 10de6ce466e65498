//! Per-connection duplex handler
//!
//! Drives one agent connection through its state machine:
//!
//! - Connecting: socket accepted, nothing received yet. The very first
//!   frame must be `Register` within the handshake timeout.
//! - Registered: identity accepted, `RegisterAck` sent, connection
//!   recorded in the pool (superseding any previous one for the same
//!   agent).
//! - Active: tasks are pushed down as `Command` frames when enqueued;
//!   the agent answers with `TaskResult` frames; heartbeat pings detect
//!   half-open sockets.
//! - Closed: the pool entry is removed and the agent's liveness entry
//!   ages out via the registry sweeper. Tasks already delivered but not
//!   yet resulted are abandoned (at-most-once delivery).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use cr_core::time::current_time_millis;
use cr_core::types::{AgentId, TransportKind};
use cr_protocol::{ErrorCode, Frame, FrameCodec, Message};

use crate::connection::DuplexConnection;
use crate::events::RelayEvent;
use crate::registry::AgentMeta;
use crate::state::ControllerState;

/// How long a connection may sit unregistered before being dropped
const REGISTER_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity for enqueue nudges; the handler drains the whole queue on
/// every wake, so a full channel loses nothing.
const NUDGE_CHANNEL_CAPACITY: usize = 16;

type AgentSink = SplitSink<Framed<TcpStream, FrameCodec>, Frame>;

/// Handle one agent connection from accept to close.
pub async fn handle_connection(
    socket: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<ControllerState>,
    cancel: CancellationToken,
) {
    let mut framed = Framed::new(socket, FrameCodec::new());

    // Connecting -> Registered: first frame must be Register.
    let agent_id = match await_register(&mut framed, &state, peer_addr).await {
        Some(id) => id,
        None => return,
    };

    let (mut sink, mut stream) = framed.split();

    let (nudge_tx, mut nudge_rx) = mpsc::channel(NUDGE_CHANNEL_CAPACITY);
    let conn = Arc::new(DuplexConnection {
        agent_id: agent_id.clone(),
        task_nudge: nudge_tx,
        cancel: cancel.clone(),
        connected_at_ms: current_time_millis(),
    });

    // A reconnect supersedes the previous connection for this identity.
    if let Some(previous) = state.connections.insert(Arc::clone(&conn)) {
        tracing::info!("Agent {} reconnected, superseding old connection", agent_id);
        previous.cancel.cancel();
    }
    state.events.emit(RelayEvent::AgentConnected {
        agent_id: agent_id.clone(),
    });

    // Push tasks that queued up while the agent was offline.
    if push_pending_tasks(&mut sink, &state, &agent_id).await.is_err() {
        close_connection(&state, &conn);
        return;
    }

    // Registered -> Active: task/result exchange with heartbeats.
    let mut heartbeat = tokio::time::interval(state.config.heartbeat_interval);
    heartbeat.tick().await; // first tick fires immediately, skip it
    let mut last_contact = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Connection for {} cancelled", agent_id);
                break;
            }

            _ = heartbeat.tick() => {
                if last_contact.elapsed() > state.config.heartbeat_timeout {
                    tracing::warn!(
                        "Agent {} missed heartbeats for {:?}, closing half-open connection",
                        agent_id,
                        last_contact.elapsed()
                    );
                    break;
                }
                let ping = Frame::control(Message::Heartbeat {
                    timestamp: current_time_millis(),
                });
                if sink.send(ping).await.is_err() {
                    break;
                }
            }

            _ = nudge_rx.recv() => {
                if push_pending_tasks(&mut sink, &state, &agent_id).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        tracing::warn!("Protocol error from {}: {}", agent_id, e);
                        break;
                    }
                    None => {
                        tracing::info!("Agent {} closed the connection", agent_id);
                        break;
                    }
                };

                last_contact = Instant::now();
                state.registry.heartbeat(&agent_id);

                if !handle_frame(&mut sink, &state, &agent_id, frame).await {
                    break;
                }
            }
        }
    }

    close_connection(&state, &conn);
}

/// Wait for the Register frame and acknowledge it.
///
/// Returns None if the handshake failed; the socket is dropped either way.
async fn await_register(
    framed: &mut Framed<TcpStream, FrameCodec>,
    state: &ControllerState,
    peer_addr: SocketAddr,
) -> Option<AgentId> {
    let first = tokio::time::timeout(REGISTER_TIMEOUT, framed.next()).await;

    let frame = match first {
        Ok(Some(Ok(frame))) => frame,
        Ok(Some(Err(e))) => {
            tracing::warn!("Protocol error from {} during handshake: {}", peer_addr, e);
            return None;
        }
        Ok(None) => {
            tracing::debug!("{} disconnected before registering", peer_addr);
            return None;
        }
        Err(_) => {
            tracing::warn!("{} sent no Register within {:?}", peer_addr, REGISTER_TIMEOUT);
            return None;
        }
    };

    match frame.message {
        Message::Register {
            agent_id,
            hostname,
            os,
            arch,
            version,
        } => {
            tracing::info!(
                "Agent registered: {} ({}) - {} {} proto={}",
                agent_id,
                hostname,
                os,
                arch,
                version.as_deref().unwrap_or("1.0")
            );

            let id = AgentId::new(agent_id);
            state.registry.register(
                id.clone(),
                AgentMeta {
                    hostname,
                    os,
                    arch,
                    transport: TransportKind::Duplex,
                },
            );

            let ack = Frame::control(Message::RegisterAck {
                accepted: true,
                reason: None,
            });
            if framed.send(ack).await.is_err() {
                return None;
            }
            Some(id)
        }
        other => {
            tracing::warn!(
                "{} sent {} before Register, closing",
                peer_addr,
                other.name()
            );
            let error = Frame::control(Message::Error {
                code: ErrorCode::NotRegistered,
                message: "first frame must be Register".to_string(),
            });
            let _ = framed.send(error).await;
            None
        }
    }
}

/// Drain the command channel and push each task as a Command frame.
///
/// Dequeued tasks are gone from the queue whether or not the send
/// succeeds: at-most-once, never auto-requeued.
async fn push_pending_tasks(
    sink: &mut AgentSink,
    state: &ControllerState,
    agent_id: &AgentId,
) -> Result<(), ()> {
    for task in state.channel.dequeue_all(agent_id) {
        tracing::debug!(
            "Pushing {} task {} to {}",
            task.kind.label(),
            task.correlation_id,
            agent_id
        );
        let frame = Frame::new(task.correlation_id, Message::Command { kind: task.kind });
        if let Err(e) = sink.send(frame).await {
            tracing::warn!(
                "Failed to push task {} to {}: {} (task is lost, not requeued)",
                task.correlation_id,
                agent_id,
                e
            );
            return Err(());
        }
    }
    Ok(())
}

/// Handle one frame in the Active state. Returns false to close.
async fn handle_frame(
    sink: &mut AgentSink,
    state: &ControllerState,
    agent_id: &AgentId,
    frame: Frame,
) -> bool {
    match frame.message {
        Message::TaskResult(result) => {
            tracing::debug!(
                "Result for {} from {}: success={}",
                frame.correlation_id,
                agent_id,
                result.success
            );
            state.results.post(frame.correlation_id, result);
            true
        }

        Message::HeartbeatAck { timestamp } => {
            let latency = current_time_millis().saturating_sub(timestamp);
            tracing::trace!("Heartbeat ack from {} ({}ms)", agent_id, latency);
            true
        }

        // Agent-initiated ping; answer it.
        Message::Heartbeat { timestamp } => {
            let ack = Frame::control(Message::HeartbeatAck { timestamp });
            sink.send(ack).await.is_ok()
        }

        Message::Error { code, message } => {
            tracing::warn!("Error frame from {}: {:?} {}", agent_id, code, message);
            true
        }

        // Re-registering on a live connection is a protocol violation.
        Message::Register { .. } => {
            tracing::warn!("Agent {} sent Register twice, closing", agent_id);
            let error = Frame::control(Message::Error {
                code: ErrorCode::InvalidMessage,
                message: "already registered".to_string(),
            });
            let _ = sink.send(error).await;
            false
        }

        other => {
            tracing::warn!("Unexpected {} frame from {}", other.name(), agent_id);
            true
        }
    }
}

/// Tear down the pool entry and announce the disconnect.
///
/// The registry entry is left to age out via the sweeper, so an agent
/// that reconnects within the liveness window keeps its queued tasks.
fn close_connection(state: &ControllerState, conn: &Arc<DuplexConnection>) {
    if state.connections.remove_if_current(conn) {
        tracing::info!("Agent {} disconnected", conn.agent_id);
        state.events.emit(RelayEvent::AgentDisconnected {
            agent_id: conn.agent_id.clone(),
        });
    }
}
