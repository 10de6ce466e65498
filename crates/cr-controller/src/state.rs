//! Global controller state

use std::sync::Arc;

use cr_core::config::ControllerConfig;
use cr_core::error::RegistryError;
use cr_core::time::current_time_millis;
use cr_core::types::{AgentId, TaskSpec};
use cr_protocol::{CorrelationId, TaskKind};

use crate::channel::CommandChannel;
use crate::connection::ConnectionPool;
use crate::events::EventBus;
use crate::registry::AgentRegistry;
use crate::results::ResultStore;

/// Shared state for the controller daemon.
///
/// The registry, channel, and result store are the only shared mutable
/// state; each is keyed per agent or per correlation id, so unrelated
/// agents never contend.
pub struct ControllerState {
    /// Configuration
    pub config: ControllerConfig,
    /// Known agents and liveness
    pub registry: AgentRegistry,
    /// Per-agent pending task queues
    pub channel: CommandChannel,
    /// Completed results by correlation id
    pub results: ResultStore,
    /// Live duplex connections
    pub connections: ConnectionPool,
    /// Event bus
    pub events: EventBus,
}

impl ControllerState {
    /// Create new controller state
    pub fn new(config: ControllerConfig) -> Arc<Self> {
        let events = EventBus::new();
        Arc::new(Self {
            registry: AgentRegistry::new(config.liveness_timeout, events.clone()),
            channel: CommandChannel::new(),
            results: ResultStore::new(),
            connections: ConnectionPool::new(),
            events,
            config,
        })
    }

    /// Enqueue a task for an agent and return its correlation id.
    ///
    /// Rejects unknown agents: enqueueing into a queue nobody will ever
    /// drain hides typos, so the target must have registered first. If a
    /// duplex connection is live, its handler is nudged to push the task
    /// immediately.
    pub fn enqueue_task(
        &self,
        agent_id: AgentId,
        kind: TaskKind,
    ) -> Result<CorrelationId, RegistryError> {
        if !self.registry.contains(&agent_id) {
            return Err(RegistryError::AgentUnknown(agent_id));
        }

        let correlation_id = CorrelationId::generate();
        let task = TaskSpec {
            correlation_id,
            agent_id: agent_id.clone(),
            kind,
            enqueued_at_ms: current_time_millis(),
        };

        tracing::debug!(
            "Enqueued {} task {} for {}",
            task.kind.label(),
            correlation_id,
            agent_id
        );
        self.channel.enqueue(task);

        if let Some(conn) = self.connections.get(&agent_id) {
            conn.nudge();
        }

        Ok(correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AgentMeta;
    use cr_core::types::TransportKind;

    fn state() -> Arc<ControllerState> {
        ControllerState::new(ControllerConfig::default())
    }

    #[tokio::test]
    async fn test_enqueue_unknown_agent_is_rejected() {
        let state = state();
        let result = state.enqueue_task(
            AgentId::new("ghost"),
            TaskKind::Shell {
                script: "echo hi".into(),
            },
        );
        assert!(matches!(result, Err(RegistryError::AgentUnknown(_))));
    }

    #[tokio::test]
    async fn test_enqueue_generates_unique_correlation_ids() {
        let state = state();
        let id = AgentId::new("a1");
        state
            .registry
            .register(id.clone(), AgentMeta::unknown(TransportKind::Polling));

        let c1 = state
            .enqueue_task(id.clone(), TaskKind::Shell { script: "a".into() })
            .unwrap();
        let c2 = state
            .enqueue_task(id.clone(), TaskKind::Shell { script: "b".into() })
            .unwrap();

        assert_ne!(c1, c2);
        assert_eq!(state.channel.pending(&id), 2);
    }
}
