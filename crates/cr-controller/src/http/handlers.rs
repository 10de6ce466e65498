//! HTTP API handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use cr_core::error::RegistryError;
use cr_core::types::{AgentId, TransportKind};
use cr_protocol::CorrelationId;

use crate::http::models::*;
use crate::registry::AgentMeta;
use crate::state::ControllerState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn parse_correlation_id(raw: &str) -> Result<CorrelationId, ApiError> {
    CorrelationId::parse(raw).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("invalid correlation id '{}'", raw),
        )
    })
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/tasks`: controller-facing enqueue
pub async fn enqueue(
    State(state): State<Arc<ControllerState>>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    let agent_id = AgentId::new(req.agent_id);
    match state.enqueue_task(agent_id, req.task) {
        Ok(correlation_id) => Ok(Json(EnqueueResponse { correlation_id })),
        Err(RegistryError::AgentUnknown(id)) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("agent unknown: {}", id),
        )),
    }
}

/// `GET /api/results/{correlation_id}`: non-blocking poll.
///
/// A correlation id nobody has answered yet reads as pending, forever if
/// need be; promoting it to failed is the caller's deadline to impose.
pub async fn get_result(
    State(state): State<Arc<ControllerState>>,
    Path(correlation_id): Path<String>,
) -> Result<Json<ResultStateResponse>, ApiError> {
    let id = parse_correlation_id(&correlation_id)?;

    let response = match state.results.get(&id) {
        Some(result) => ResultStateResponse {
            state: ResultState::Done,
            result: Some(result),
        },
        None => ResultStateResponse {
            state: ResultState::Pending,
            result: None,
        },
    };
    Ok(Json(response))
}

/// `DELETE /api/results/{correlation_id}`: consumer-driven cleanup
pub async fn delete_result(
    State(state): State<Arc<ControllerState>>,
    Path(correlation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_correlation_id(&correlation_id)?;
    state.results.delete(&id);
    Ok(StatusCode::OK)
}

/// `GET /api/agents`
pub async fn list_agents(
    State(state): State<Arc<ControllerState>>,
) -> Json<ListAgentsResponse> {
    let agents = state.registry.list();
    let total = agents.len();
    Json(ListAgentsResponse { agents, total })
}

/// `GET /api/agents/{agent_id}/tasks`: deprecated polling transport.
///
/// Atomically drains the agent's queue. Contact auto-registers the
/// agent: the id is the agent's own stable identity, so showing up is
/// registration. Delivery is at-most-once; a response lost on the wire
/// is a lost task.
pub async fn poll_tasks(
    State(state): State<Arc<ControllerState>>,
    Path(agent_id): Path<String>,
) -> Json<PollTasksResponse> {
    let id = AgentId::new(agent_id);

    if !state.registry.heartbeat(&id) {
        state
            .registry
            .register(id.clone(), AgentMeta::unknown(TransportKind::Polling));
    }

    let tasks = state.channel.dequeue_all(&id);
    if !tasks.is_empty() {
        tracing::debug!("Polling agent {} drained {} tasks", id, tasks.len());
    }
    Json(PollTasksResponse { tasks })
}

/// `POST /api/agents/{agent_id}/results`: deprecated polling transport
pub async fn post_result(
    State(state): State<Arc<ControllerState>>,
    Path(agent_id): Path<String>,
    Json(req): Json<PostResultRequest>,
) -> StatusCode {
    let id = AgentId::new(agent_id);

    if !state.registry.heartbeat(&id) {
        state
            .registry
            .register(id.clone(), AgentMeta::unknown(TransportKind::Polling));
    }

    tracing::debug!(
        "Result for {} posted by {}: success={}",
        req.correlation_id,
        id,
        req.result.success
    );
    state.results.post(req.correlation_id, req.result);
    StatusCode::OK
}
