//! Agent registry and liveness sweeper
//!
//! Tracks known agents and when they were last heard from. A periodic
//! sweeper evicts agents silent past the liveness timeout and discards
//! their pending queues, a deliberate silent-loss policy made observable
//! through `TaskLost` events on the bus.

use std::sync::Arc;

use dashmap::DashMap;

use cr_core::time::{current_time_millis, elapsed_millis};
use cr_core::types::{AgentId, AgentInfo, AgentState, TransportKind};

use crate::channel::CommandChannel;
use crate::events::{EventBus, RelayEvent};
use crate::state::ControllerState;

/// Metadata reported by an agent at registration
#[derive(Debug, Clone)]
pub struct AgentMeta {
    /// Hostname of the agent machine
    pub hostname: String,
    /// Operating system
    pub os: String,
    /// CPU architecture
    pub arch: String,
    /// Transport the agent registered over
    pub transport: TransportKind,
}

impl AgentMeta {
    /// Placeholder metadata for polling agents that only ever send their
    /// id in the URL path.
    pub fn unknown(transport: TransportKind) -> Self {
        Self {
            hostname: "unknown".to_string(),
            os: "unknown".to_string(),
            arch: "unknown".to_string(),
            transport,
        }
    }
}

/// Registry entry for one agent
#[derive(Debug, Clone)]
struct AgentEntry {
    meta: AgentMeta,
    registered_at_ms: u64,
    last_seen_ms: u64,
}

/// Tracks known agents and their liveness
pub struct AgentRegistry {
    agents: DashMap<AgentId, AgentEntry>,
    liveness_timeout_ms: u64,
    events: EventBus,
}

impl AgentRegistry {
    /// Create a registry with the given liveness timeout
    pub fn new(liveness_timeout: std::time::Duration, events: EventBus) -> Self {
        Self {
            agents: DashMap::new(),
            liveness_timeout_ms: liveness_timeout.as_millis() as u64,
            events,
        }
    }

    /// Create or reactivate an agent entry
    pub fn register(&self, agent_id: AgentId, meta: AgentMeta) {
        let now = current_time_millis();
        self.agents
            .entry(agent_id.clone())
            .and_modify(|entry| {
                entry.meta = meta.clone();
                entry.last_seen_ms = now;
            })
            .or_insert_with(|| AgentEntry {
                meta,
                registered_at_ms: now,
                last_seen_ms: now,
            });
        self.events.emit(RelayEvent::AgentRegistered { agent_id });
    }

    /// Refresh last-seen for a known agent. Returns false for unknown
    /// ids; the caller decides whether unknown implies auto-register.
    pub fn heartbeat(&self, agent_id: &AgentId) -> bool {
        match self.agents.get_mut(agent_id) {
            Some(mut entry) => {
                entry.last_seen_ms = current_time_millis();
                true
            }
            None => false,
        }
    }

    /// Whether the agent is currently registered
    pub fn contains(&self, agent_id: &AgentId) -> bool {
        self.agents.contains_key(agent_id)
    }

    /// Registry view for the list API
    pub fn list(&self) -> Vec<AgentInfo> {
        self.agents
            .iter()
            .map(|entry| {
                let state = self.compute_state(&entry);
                AgentInfo {
                    agent_id: entry.key().clone(),
                    hostname: entry.meta.hostname.clone(),
                    os: entry.meta.os.clone(),
                    arch: entry.meta.arch.clone(),
                    transport: entry.meta.transport,
                    last_seen_ms: entry.last_seen_ms,
                    state,
                }
            })
            .collect()
    }

    /// Number of registered agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    fn compute_state(&self, entry: &AgentEntry) -> AgentState {
        if elapsed_millis(entry.last_seen_ms) > self.liveness_timeout_ms {
            AgentState::Stale
        } else if entry.last_seen_ms == entry.registered_at_ms {
            AgentState::Registered
        } else {
            AgentState::Active
        }
    }

    /// Evict agents past the liveness timeout, discarding their queues.
    ///
    /// Every discarded task is emitted as a `TaskLost` event so the loss
    /// is observable. Returns the evicted agent ids.
    pub fn sweep(&self, channel: &CommandChannel) -> Vec<AgentId> {
        let stale: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|entry| elapsed_millis(entry.last_seen_ms) > self.liveness_timeout_ms)
            .map(|entry| entry.key().clone())
            .collect();

        for agent_id in &stale {
            self.agents.remove(agent_id);

            let lost = channel.discard(agent_id);
            if !lost.is_empty() {
                tracing::warn!(
                    "Evicting {}: discarding {} undelivered tasks",
                    agent_id,
                    lost.len()
                );
            }
            for task in lost {
                self.events.emit(RelayEvent::TaskLost {
                    agent_id: agent_id.clone(),
                    correlation_id: task.correlation_id,
                });
            }

            tracing::info!("Agent {} evicted after liveness timeout", agent_id);
            self.events.emit(RelayEvent::AgentEvicted {
                agent_id: agent_id.clone(),
            });
        }

        stale
    }
}

/// Run the registry sweeper until cancelled.
///
/// Independent periodic background unit, decoupled from request handling.
pub async fn run_sweeper(state: Arc<ControllerState>, cancel: tokio_util::sync::CancellationToken) {
    let mut interval = tokio::time::interval(state.config.sweep_interval);

    tracing::info!(
        "Starting registry sweeper (liveness timeout: {:?}, interval: {:?})",
        state.config.liveness_timeout,
        state.config.sweep_interval
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let evicted = state.registry.sweep(&state.channel);
                if !evicted.is_empty() {
                    tracing::info!("Sweep evicted {} agents", evicted.len());
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Registry sweeper shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cr_protocol::{CorrelationId, TaskKind};
    use cr_core::types::TaskSpec;
    use std::time::Duration;

    fn registry(timeout: Duration) -> (AgentRegistry, EventBus) {
        let events = EventBus::new();
        (AgentRegistry::new(timeout, events.clone()), events)
    }

    #[tokio::test]
    async fn test_register_and_heartbeat() {
        let (registry, _) = registry(Duration::from_secs(300));
        let id = AgentId::new("a1");

        assert!(!registry.heartbeat(&id));
        registry.register(id.clone(), AgentMeta::unknown(TransportKind::Polling));
        assert!(registry.contains(&id));
        assert!(registry.heartbeat(&id));

        let infos = registry.list();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].agent_id, id);
        assert_eq!(infos[0].state, AgentState::Active);
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_agents() {
        let (registry, _) = registry(Duration::from_secs(300));
        let channel = CommandChannel::new();
        registry.register(
            AgentId::new("a1"),
            AgentMeta::unknown(TransportKind::Duplex),
        );

        let evicted = registry.sweep(&channel);
        assert!(evicted.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_evicts_and_emits_task_lost() {
        // Zero timeout: any registered agent is immediately past it.
        let (registry, events) = registry(Duration::ZERO);
        let channel = CommandChannel::new();
        let id = AgentId::new("a1");
        let mut rx = events.subscribe();

        registry.register(id.clone(), AgentMeta::unknown(TransportKind::Polling));
        for script in ["echo one", "echo two"] {
            channel.enqueue(TaskSpec {
                correlation_id: CorrelationId::generate(),
                agent_id: id.clone(),
                kind: TaskKind::Shell {
                    script: script.to_string(),
                },
                enqueued_at_ms: current_time_millis(),
            });
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
        let evicted = registry.sweep(&channel);
        assert_eq!(evicted, vec![id.clone()]);
        assert!(!registry.contains(&id));
        assert!(channel.dequeue_all(&id).is_empty());

        // Register + 2 TaskLost + evicted, in emission order.
        let mut task_lost = 0;
        let mut evicted_seen = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                RelayEvent::TaskLost { agent_id, .. } => {
                    assert_eq!(agent_id, id);
                    task_lost += 1;
                }
                RelayEvent::AgentEvicted { agent_id } => {
                    assert_eq!(agent_id, id);
                    evicted_seen = true;
                }
                _ => {}
            }
        }
        assert_eq!(task_lost, 2);
        assert!(evicted_seen);
    }
}
