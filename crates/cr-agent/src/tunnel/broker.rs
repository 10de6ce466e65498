//! Tunnel session management
//!
//! `open` authenticates once to the jump host, verifies the destination
//! is reachable from there with a probe channel, then serves a local
//! ephemeral listener whose connections are forwarded over per-connection
//! `direct-tcpip` channels. `close` tears the whole session down and
//! releases the local port. An idle reaper closes sessions with no relay
//! activity past the idle timeout.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use russh::client::Handle;
use russh::Disconnect;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use cr_core::error::TunnelError;
use cr_core::time::{current_time_millis, elapsed_millis};
use cr_protocol::JumpHost;

use crate::ssh::{self, AcceptingClient, SshAuthError};
use crate::tunnel::relay;

/// Interval between idle-session checks
const REAPER_INTERVAL: Duration = Duration::from_secs(30);

/// Bound on waiting for a closed session's forwarder task to finish
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Caller's view of an open tunnel
#[derive(Debug, Clone, Copy)]
pub struct TunnelHandle {
    /// Session id for closing the tunnel
    pub session_id: Uuid,
    /// Local endpoint; connecting here lands on the destination
    pub local_addr: SocketAddr,
}

/// One forwarding session through a jump host
struct TunnelSession {
    dest: String,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    last_activity_ms: Arc<AtomicU64>,
    forwarder: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Establishes and tracks forwarding sessions
pub struct TunnelBroker {
    sessions: DashMap<Uuid, Arc<TunnelSession>>,
    open_timeout: Duration,
    idle_timeout: Duration,
}

impl TunnelBroker {
    /// Create a broker with the given bounds
    pub fn new(open_timeout: Duration, idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            open_timeout,
            idle_timeout,
        }
    }

    /// Open a forwarding path to `dest_host:dest_port` through the jump
    /// host. Bounded by the open timeout: this never hangs.
    pub async fn open(
        &self,
        jump: &JumpHost,
        dest_host: &str,
        dest_port: u16,
    ) -> Result<TunnelHandle, TunnelError> {
        let dest = format!("{}:{}", dest_host, dest_port);
        match tokio::time::timeout(
            self.open_timeout,
            self.establish(jump, dest_host, dest_port),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TunnelError::Timeout {
                dest,
                timeout_secs: self.open_timeout.as_secs(),
            }),
        }
    }

    async fn establish(
        &self,
        jump: &JumpHost,
        dest_host: &str,
        dest_port: u16,
    ) -> Result<TunnelHandle, TunnelError> {
        let dest = format!("{}:{}", dest_host, dest_port);

        tracing::debug!("Opening tunnel to {} via {}", dest, jump.address());
        let mut session = ssh::connect(&jump.address(), self.open_timeout)
            .await
            .map_err(|reason| TunnelError::Unreachable {
                dest: jump.address(),
                reason,
            })?;

        if let Err(e) = ssh::authenticate(&mut session, &jump.username, &jump.auth).await {
            let _ = session
                .disconnect(Disconnect::ByApplication, "auth failed", "en")
                .await;
            return Err(match e {
                SshAuthError::Rejected => {
                    TunnelError::Auth(format!("jump host {} rejected credentials", jump.address()))
                }
                other => TunnelError::Auth(other.to_string()),
            });
        }

        // Probe the destination before claiming the tunnel is open, so
        // an unreachable destination fails `open` instead of the first
        // relayed connection.
        match session
            .channel_open_direct_tcpip(dest_host, dest_port as u32, "127.0.0.1", 0)
            .await
        {
            Ok(mut probe) => {
                let _ = probe.close().await;
            }
            Err(e) => {
                let _ = session
                    .disconnect(Disconnect::ByApplication, "probe failed", "en")
                    .await;
                return Err(TunnelError::Unreachable {
                    dest,
                    reason: e.to_string(),
                });
            }
        }

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let local_addr = listener.local_addr()?;

        let session_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let last_activity_ms = Arc::new(AtomicU64::new(current_time_millis()));

        let forwarder = tokio::spawn(run_forwarder(
            listener,
            session,
            dest_host.to_string(),
            dest_port,
            cancel.clone(),
            Arc::clone(&last_activity_ms),
        ));

        self.sessions.insert(
            session_id,
            Arc::new(TunnelSession {
                dest: dest.clone(),
                local_addr,
                cancel,
                last_activity_ms,
                forwarder: Mutex::new(Some(forwarder)),
            }),
        );

        tracing::info!("Tunnel {} open: {} -> {}", session_id, local_addr, dest);
        Ok(TunnelHandle {
            session_id,
            local_addr,
        })
    }

    /// Close a session: cancel the forwarder, disconnect the jump host,
    /// and wait for the listener to be dropped so the local port is
    /// immediately reusable.
    pub async fn close(&self, session_id: Uuid) -> Result<(), TunnelError> {
        let (_, session) = self
            .sessions
            .remove(&session_id)
            .ok_or_else(|| TunnelError::SessionNotFound(session_id.to_string()))?;

        session.cancel.cancel();
        if let Some(task) = session.forwarder.lock().await.take() {
            let _ = tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, task).await;
        }

        tracing::info!("Tunnel {} to {} closed", session_id, session.dest);
        Ok(())
    }

    /// Close sessions with no relay activity past the idle timeout
    pub async fn reap_idle(&self) -> usize {
        let idle: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| {
                elapsed_millis(entry.last_activity_ms.load(Ordering::Relaxed))
                    > self.idle_timeout.as_millis() as u64
            })
            .map(|entry| *entry.key())
            .collect();

        for session_id in &idle {
            tracing::info!("Reaping idle tunnel {}", session_id);
            let _ = self.close(*session_id).await;
        }
        idle.len()
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if there are no open sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Accept local connections and forward each through its own
/// direct-tcpip channel until cancelled.
async fn run_forwarder(
    listener: TcpListener,
    mut session: Handle<AcceptingClient>,
    dest_host: String,
    dest_port: u16,
    cancel: CancellationToken,
    activity: Arc<AtomicU64>,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            accepted = listener.accept() => {
                let (socket, peer_addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!("Tunnel listener accept failed: {}", e);
                        break;
                    }
                };

                let channel = match session
                    .channel_open_direct_tcpip(
                        dest_host.as_str(),
                        dest_port as u32,
                        peer_addr.ip().to_string(),
                        peer_addr.port() as u32,
                    )
                    .await
                {
                    Ok(channel) => channel,
                    Err(e) => {
                        tracing::warn!(
                            "Forward channel to {}:{} failed: {}",
                            dest_host,
                            dest_port,
                            e
                        );
                        continue;
                    }
                };

                activity.store(current_time_millis(), Ordering::Relaxed);
                let activity = Arc::clone(&activity);
                tokio::spawn(relay::relay_streams(socket, channel.into_stream(), activity));
            }
        }
    }

    // Disconnecting closes every channel stream, which unblocks any
    // relay loop still parked in a read. The listener drops with this
    // frame, releasing the local port.
    let _ = session
        .disconnect(Disconnect::ByApplication, "tunnel closed", "en")
        .await;
}

/// Run the idle-tunnel reaper until cancelled.
///
/// Independent periodic background unit, decoupled from task execution.
pub async fn run_reaper(broker: Arc<TunnelBroker>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(REAPER_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let reaped = broker.reap_idle().await;
                if reaped > 0 {
                    tracing::info!("Reaped {} idle tunnels", reaped);
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Tunnel reaper shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cr_protocol::{AuthMethod, SecretRef};
    use std::time::Instant;

    fn jump_to(addr: SocketAddr) -> JumpHost {
        std::env::set_var("CR_TUNNEL_TEST_PW", "irrelevant");
        JumpHost {
            host: addr.ip().to_string(),
            port: addr.port(),
            username: "bridge".to_string(),
            auth: AuthMethod::Password {
                secret: SecretRef::Env("CR_TUNNEL_TEST_PW".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_open_to_unreachable_jump_fails_within_bound() {
        // Grab a free port, then close it so nothing is listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let broker = TunnelBroker::new(Duration::from_secs(5), Duration::from_secs(300));
        let started = Instant::now();
        let result = broker.open(&jump_to(addr), "10.255.0.1", 22).await;

        assert!(result.is_err());
        // Bounded: refused or timed out, never hanging.
        assert!(started.elapsed() < Duration::from_secs(10));
        match result.unwrap_err() {
            TunnelError::Unreachable { .. } | TunnelError::Timeout { .. } => {}
            other => panic!("unexpected error kind: {:?}", other),
        }
        assert!(broker.is_empty());
    }

    #[tokio::test]
    async fn test_close_unknown_session() {
        let broker = TunnelBroker::new(Duration::from_secs(5), Duration::from_secs(300));
        let result = broker.close(Uuid::new_v4()).await;
        assert!(matches!(result, Err(TunnelError::SessionNotFound(_))));
    }
}
