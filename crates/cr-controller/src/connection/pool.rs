//! Pool of live duplex connections

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cr_core::types::AgentId;

/// Handle to one live duplex connection.
///
/// The connection handler owns the socket; the pool only keeps what the
/// rest of the controller needs: a nudge channel to wake the handler
/// when tasks are enqueued, and a token to disconnect it.
pub struct DuplexConnection {
    /// Agent on the other end
    pub agent_id: AgentId,
    /// Wakes the handler to drain the command channel
    pub task_nudge: mpsc::Sender<()>,
    /// Cancels the connection
    pub cancel: CancellationToken,
    /// When the connection registered, milliseconds since the Unix epoch
    pub connected_at_ms: u64,
}

impl DuplexConnection {
    /// Wake the handler; a full nudge queue is fine, the handler drains
    /// the whole command queue on every wake anyway.
    pub fn nudge(&self) {
        let _ = self.task_nudge.try_send(());
    }
}

/// Live duplex connections indexed by agent id
pub struct ConnectionPool {
    connections: DashMap<AgentId, Arc<DuplexConnection>>,
}

impl ConnectionPool {
    /// Create a new empty pool
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection, returning any previous connection for the
    /// same agent (a reconnect supersedes it; the caller cancels it).
    pub fn insert(&self, conn: Arc<DuplexConnection>) -> Option<Arc<DuplexConnection>> {
        self.connections.insert(conn.agent_id.clone(), conn)
    }

    /// Get a connection by agent id
    pub fn get(&self, agent_id: &AgentId) -> Option<Arc<DuplexConnection>> {
        self.connections.get(agent_id).map(|r| Arc::clone(&r))
    }

    /// Remove a connection, but only if it is the given one: a handler
    /// tearing down must not remove the connection of a newer session
    /// that already replaced it.
    pub fn remove_if_current(&self, conn: &Arc<DuplexConnection>) -> bool {
        self.connections
            .remove_if(&conn.agent_id, |_, current| Arc::ptr_eq(current, conn))
            .is_some()
    }

    /// List all connections
    pub fn list(&self) -> Vec<Arc<DuplexConnection>> {
        self.connections.iter().map(|r| Arc::clone(&r)).collect()
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if pool is empty
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}
