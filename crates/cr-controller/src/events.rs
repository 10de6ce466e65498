//! Controller event bus
//!
//! Registry and transport state changes are published on a broadcast
//! channel so they are observable: the deliberate silent-loss policy of
//! the command channel (tasks discarded when an agent is evicted) shows
//! up here as `TaskLost` events instead of disappearing.

use tokio::sync::broadcast;

use cr_core::types::AgentId;
use cr_protocol::CorrelationId;

/// Capacity of the event channel; slow subscribers miss old events
/// rather than backpressuring the registry.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Events emitted by the controller core
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// An agent registered or re-registered
    AgentRegistered { agent_id: AgentId },

    /// The sweeper evicted an agent past the liveness timeout
    AgentEvicted { agent_id: AgentId },

    /// A queued, undelivered task was discarded during eviction
    TaskLost {
        agent_id: AgentId,
        correlation_id: CorrelationId,
    },

    /// A duplex connection registered
    AgentConnected { agent_id: AgentId },

    /// A duplex connection closed
    AgentDisconnected { agent_id: AgentId },
}

/// Broadcast bus for [`RelayEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RelayEvent>,
}

impl EventBus {
    /// Create a new bus
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Succeeds even with no subscribers.
    pub fn emit(&self, event: RelayEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
