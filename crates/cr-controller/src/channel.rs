//! Per-agent command channel
//!
//! Ordered FIFO of pending tasks per agent. Delivery is destructive:
//! `dequeue_all` atomically drains the queue, and a task that leaves the
//! queue is never requeued, even if the transport fails to reach the
//! agent afterwards. That at-most-once tradeoff is part of the contract;
//! the companion loss path (eviction discarding a queue) is made
//! observable through `TaskLost` events rather than hidden.

use std::collections::VecDeque;
use std::sync::Mutex;

use dashmap::DashMap;

use cr_core::types::{AgentId, TaskSpec};

/// Per-agent ordered queues of pending tasks.
///
/// Locking is per agent: each queue has its own mutex, so one agent's
/// enqueue/dequeue never blocks another's.
pub struct CommandChannel {
    queues: DashMap<AgentId, Mutex<VecDeque<TaskSpec>>>,
}

impl CommandChannel {
    /// Create an empty channel
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }

    /// Append a task to its agent's queue
    pub fn enqueue(&self, task: TaskSpec) {
        let queue = self
            .queues
            .entry(task.agent_id.clone())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        queue
            .lock()
            .expect("command queue mutex poisoned")
            .push_back(task);
    }

    /// Atomically drain and return the agent's queue, in enqueue order.
    ///
    /// Unknown agents simply have nothing pending.
    pub fn dequeue_all(&self, agent_id: &AgentId) -> Vec<TaskSpec> {
        match self.queues.get(agent_id) {
            Some(queue) => queue
                .lock()
                .expect("command queue mutex poisoned")
                .drain(..)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Remove the agent's queue entirely, returning whatever was still
    /// pending. Used by eviction; callers emit a `TaskLost` event per
    /// returned task.
    pub fn discard(&self, agent_id: &AgentId) -> Vec<TaskSpec> {
        match self.queues.remove(agent_id) {
            Some((_, queue)) => queue
                .into_inner()
                .expect("command queue mutex poisoned")
                .into_iter()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Number of pending tasks for an agent
    pub fn pending(&self, agent_id: &AgentId) -> usize {
        self.queues
            .get(agent_id)
            .map(|q| q.lock().expect("command queue mutex poisoned").len())
            .unwrap_or(0)
    }
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cr_core::time::current_time_millis;
    use cr_protocol::{CorrelationId, TaskKind};

    fn task(agent: &str, script: &str) -> TaskSpec {
        TaskSpec {
            correlation_id: CorrelationId::generate(),
            agent_id: AgentId::new(agent),
            kind: TaskKind::Shell {
                script: script.to_string(),
            },
            enqueued_at_ms: current_time_millis(),
        }
    }

    #[test]
    fn test_dequeue_preserves_enqueue_order() {
        let channel = CommandChannel::new();
        let agent = AgentId::new("a1");
        let t1 = task("a1", "echo one");
        let t2 = task("a1", "echo two");

        channel.enqueue(t1.clone());
        channel.enqueue(t2.clone());

        let drained = channel.dequeue_all(&agent);
        assert_eq!(drained, vec![t1, t2]);
    }

    #[test]
    fn test_dequeue_is_destructive() {
        let channel = CommandChannel::new();
        let agent = AgentId::new("a1");
        channel.enqueue(task("a1", "echo hi"));

        assert_eq!(channel.dequeue_all(&agent).len(), 1);
        // At-most-once: a second drain finds nothing, nothing requeues.
        assert!(channel.dequeue_all(&agent).is_empty());
    }

    #[test]
    fn test_unknown_agent_has_empty_queue() {
        let channel = CommandChannel::new();
        assert!(channel.dequeue_all(&AgentId::new("ghost")).is_empty());
        assert_eq!(channel.pending(&AgentId::new("ghost")), 0);
    }

    #[test]
    fn test_queues_are_independent_per_agent() {
        let channel = CommandChannel::new();
        channel.enqueue(task("a1", "echo a1"));
        channel.enqueue(task("a2", "echo a2"));

        assert_eq!(channel.pending(&AgentId::new("a1")), 1);
        assert_eq!(channel.dequeue_all(&AgentId::new("a2")).len(), 1);
        assert_eq!(channel.pending(&AgentId::new("a1")), 1);
    }

    #[test]
    fn test_discard_returns_pending_tasks() {
        let channel = CommandChannel::new();
        let agent = AgentId::new("a1");
        channel.enqueue(task("a1", "echo one"));
        channel.enqueue(task("a1", "echo two"));

        let lost = channel.discard(&agent);
        assert_eq!(lost.len(), 2);
        assert!(channel.dequeue_all(&agent).is_empty());
    }
}
