//! Controller HTTP API
//!
//! Two surfaces share the router:
//!
//! - Controller-facing: enqueue tasks, poll results by correlation id,
//!   delete results, list agents, health.
//! - Agent-facing (deprecated polling transport): drain the task queue,
//!   post results. Poll contact auto-registers the agent, since the
//!   agent owns its identity.
//!
//! Malformed bodies are rejected synchronously at this boundary by the
//! Json extractor; domain errors map to status codes here and nowhere
//! deeper.

mod handlers;
mod models;

pub use models::{
    EnqueueRequest, EnqueueResponse, ErrorResponse, HealthResponse, ListAgentsResponse,
    PollTasksResponse, PostResultRequest, ResultStateResponse,
};

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::ControllerState;

/// Build the API router over the shared controller state
pub fn router(state: Arc<ControllerState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/tasks", post(handlers::enqueue))
        .route(
            "/api/results/:correlation_id",
            get(handlers::get_result).delete(handlers::delete_result),
        )
        .route("/api/agents", get(handlers::list_agents))
        .route("/api/agents/:agent_id/tasks", get(handlers::poll_tasks))
        .route("/api/agents/:agent_id/results", post(handlers::post_result))
        .with_state(state)
}
