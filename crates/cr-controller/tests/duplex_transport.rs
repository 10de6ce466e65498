//! Integration tests for the duplex transport state machine.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use cr_controller::server::DuplexServer;
use cr_controller::ControllerState;
use cr_core::config::ControllerConfig;
use cr_core::types::AgentId;
use cr_protocol::{ErrorCode, Frame, FrameCodec, Message, TaskKind, TaskResult};

async fn start_server(
    state: Arc<ControllerState>,
) -> (std::net::SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();

    let server_cancel = cancel.clone();
    tokio::spawn(async move {
        let server = DuplexServer::new(state, server_cancel);
        server.run_on(listener).await.unwrap();
    });

    (addr, cancel)
}

async fn connect_and_register(
    addr: std::net::SocketAddr,
    agent_id: &str,
) -> Framed<TcpStream, FrameCodec> {
    let socket = TcpStream::connect(addr).await.unwrap();
    let mut framed = Framed::new(socket, FrameCodec::new());

    framed
        .send(Frame::control(Message::Register {
            agent_id: agent_id.to_string(),
            hostname: "test-host".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            version: Some(cr_protocol::PROTOCOL_VERSION.to_string()),
        }))
        .await
        .unwrap();

    let ack = tokio::time::timeout(Duration::from_secs(5), framed.next())
        .await
        .expect("no RegisterAck within 5s")
        .unwrap()
        .unwrap();
    match ack.message {
        Message::RegisterAck { accepted, .. } => assert!(accepted),
        other => panic!("expected RegisterAck, got {:?}", other),
    }

    framed
}

/// Read frames until a Command arrives, answering heartbeats on the way.
async fn next_command(framed: &mut Framed<TcpStream, FrameCodec>) -> Frame {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), framed.next())
            .await
            .expect("no Command within 5s")
            .unwrap()
            .unwrap();
        match &frame.message {
            Message::Command { .. } => return frame,
            Message::Heartbeat { timestamp } => {
                framed
                    .send(Frame::control(Message::HeartbeatAck {
                        timestamp: *timestamp,
                    }))
                    .await
                    .unwrap();
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }
}

async fn await_result(
    state: &ControllerState,
    id: cr_protocol::CorrelationId,
) -> TaskResult {
    for _ in 0..100 {
        if let Some(result) = state.results.get(&id) {
            return result;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("result for {} never arrived", id);
}

#[tokio::test]
async fn test_register_push_and_result_roundtrip() {
    let state = ControllerState::new(ControllerConfig::default());
    let (addr, _cancel) = start_server(Arc::clone(&state)).await;

    let mut framed = connect_and_register(addr, "agent-duplex").await;
    assert!(state.registry.contains(&AgentId::new("agent-duplex")));

    let correlation_id = state
        .enqueue_task(
            AgentId::new("agent-duplex"),
            TaskKind::Shell {
                script: "echo hi".to_string(),
            },
        )
        .unwrap();

    let command = next_command(&mut framed).await;
    assert_eq!(command.correlation_id, correlation_id);
    match command.message {
        Message::Command {
            kind: TaskKind::Shell { script },
        } => assert_eq!(script, "echo hi"),
        other => panic!("expected shell Command, got {:?}", other),
    }

    let result = TaskResult::completed("hi\n".to_string(), String::new(), 0, 1);
    framed
        .send(Frame::new(
            correlation_id,
            Message::TaskResult(result.clone()),
        ))
        .await
        .unwrap();

    let stored = await_result(&state, correlation_id).await;
    assert_eq!(stored, result);
}

#[tokio::test]
async fn test_first_frame_must_be_register() {
    let state = ControllerState::new(ControllerConfig::default());
    let (addr, _cancel) = start_server(state).await;

    let socket = TcpStream::connect(addr).await.unwrap();
    let mut framed = Framed::new(socket, FrameCodec::new());

    framed
        .send(Frame::control(Message::Heartbeat { timestamp: 1 }))
        .await
        .unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), framed.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match reply.message {
        Message::Error { code, .. } => assert_eq!(code, ErrorCode::NotRegistered),
        other => panic!("expected Error frame, got {:?}", other),
    }

    // Connection is closed after the protocol violation.
    let end = tokio::time::timeout(Duration::from_secs(5), framed.next())
        .await
        .unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_tasks_queued_while_offline_are_pushed_on_reconnect() {
    let state = ControllerState::new(ControllerConfig::default());
    let (addr, _cancel) = start_server(Arc::clone(&state)).await;

    // First session registers the identity, then drops.
    let framed = connect_and_register(addr, "agent-affinity").await;
    drop(framed);

    // Wait for the server to notice the close.
    for _ in 0..100 {
        if state.connections.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // The registry entry survives the disconnect (it ages out via the
    // sweeper), so enqueue still accepts tasks for this identity.
    let correlation_id = state
        .enqueue_task(
            AgentId::new("agent-affinity"),
            TaskKind::Shell {
                script: "uptime".to_string(),
            },
        )
        .unwrap();

    // Reconnect with the same stable identity: the queued task is pushed
    // immediately after registration.
    let mut framed = connect_and_register(addr, "agent-affinity").await;
    let command = next_command(&mut framed).await;
    assert_eq!(command.correlation_id, correlation_id);
}
