//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use cr_protocol::{CorrelationId, TaskKind};

/// Stable identifier for an agent.
///
/// Generated once per machine and persisted (see [`crate::identity`]);
/// task affinity across reconnects depends on this staying stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    /// Create a new agent ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Liveness state of a registered agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Known but not heard from yet on the current transport
    Registered,
    /// Recently seen within the liveness timeout
    Active,
    /// Past the liveness timeout; next sweep evicts it
    Stale,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Registered => write!(f, "registered"),
            AgentState::Active => write!(f, "active"),
            AgentState::Stale => write!(f, "stale"),
        }
    }
}

/// Which transport binding an agent last used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Persistent duplex connection (primary)
    Duplex,
    /// HTTP polling (deprecated fallback)
    Polling,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Duplex => write!(f, "duplex"),
            TransportKind::Polling => write!(f, "polling"),
        }
    }
}

/// Registry view of an agent, as returned by the list API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Stable agent identity
    pub agent_id: AgentId,
    /// Hostname reported at registration
    pub hostname: String,
    /// Operating system reported at registration
    pub os: String,
    /// CPU architecture reported at registration
    pub arch: String,
    /// Transport the agent last used
    pub transport: TransportKind,
    /// Last contact, milliseconds since the Unix epoch
    pub last_seen_ms: u64,
    /// Liveness state computed against the timeout
    pub state: AgentState,
}

/// A task owned by the command channel until delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Correlation id linking the task to its eventual result
    pub correlation_id: CorrelationId,
    /// Agent the task is addressed to
    pub agent_id: AgentId,
    /// What to execute
    pub kind: TaskKind,
    /// Enqueue time, milliseconds since the Unix epoch
    pub enqueued_at_ms: u64,
}
