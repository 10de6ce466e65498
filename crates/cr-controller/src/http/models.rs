//! Request/response bodies for the HTTP API

use serde::{Deserialize, Serialize};

use cr_core::types::{AgentInfo, TaskSpec};
use cr_protocol::{CorrelationId, TaskKind, TaskResult};

/// Body of `POST /api/tasks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    /// Target agent
    pub agent_id: String,
    /// What to execute
    pub task: TaskKind,
}

/// Response of `POST /api/tasks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    /// Token to poll the result with
    pub correlation_id: CorrelationId,
}

/// Response of `GET /api/results/{correlation_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultStateResponse {
    /// "pending" or "done"
    pub state: ResultState,
    /// Present when state is done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

/// Poll state of a correlation id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultState {
    /// No result yet; absence is not an error
    Pending,
    /// Result available
    Done,
}

/// Response of `GET /api/agents`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAgentsResponse {
    /// Registered agents
    pub agents: Vec<AgentInfo>,
    /// Convenience count
    pub total: usize,
}

/// Response of `GET /api/agents/{agent_id}/tasks` (polling transport)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollTasksResponse {
    /// Drained tasks, in enqueue order
    pub tasks: Vec<TaskSpec>,
}

/// Body of `POST /api/agents/{agent_id}/results` (polling transport)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResultRequest {
    /// Correlation id of the executed task
    pub correlation_id: CorrelationId,
    /// Execution outcome
    pub result: TaskResult,
}

/// Response of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" when the process answers
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Error body for non-2xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable reason
    pub error: String,
}
