//! HTTP client for the controller API

use anyhow::{anyhow, Context, Result};

use cr_controller::http::{
    EnqueueRequest, EnqueueResponse, HealthResponse, ListAgentsResponse, ResultStateResponse,
};
use cr_protocol::{CorrelationId, TaskKind};

/// Client for the controller's HTTP API
pub struct ControllerClient {
    base_url: String,
    http: reqwest::Client,
}

impl ControllerClient {
    /// Create a client for the given base URL (e.g. `http://host:7601`)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Check controller health
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .with_context(|| format!("cannot reach controller at {}", self.base_url))?;
        Ok(response.json().await?)
    }

    /// List registered agents
    pub async fn list_agents(&self) -> Result<ListAgentsResponse> {
        let response = self
            .http
            .get(format!("{}/api/agents", self.base_url))
            .send()
            .await
            .with_context(|| format!("cannot reach controller at {}", self.base_url))?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// Enqueue a task and return its correlation id
    pub async fn enqueue(&self, agent_id: &str, task: TaskKind) -> Result<CorrelationId> {
        let response = self
            .http
            .post(format!("{}/api/tasks", self.base_url))
            .json(&EnqueueRequest {
                agent_id: agent_id.to_string(),
                task,
            })
            .send()
            .await
            .with_context(|| format!("cannot reach controller at {}", self.base_url))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(anyhow!("agent unknown: {}", agent_id));
        }
        let body: EnqueueResponse = response.error_for_status()?.json().await?;
        Ok(body.correlation_id)
    }

    /// Fetch the state of a correlation id
    pub async fn get_result(&self, correlation_id: &str) -> Result<ResultStateResponse> {
        let response = self
            .http
            .get(format!("{}/api/results/{}", self.base_url, correlation_id))
            .send()
            .await
            .with_context(|| format!("cannot reach controller at {}", self.base_url))?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// Delete a stored result
    pub async fn delete_result(&self, correlation_id: &str) -> Result<()> {
        self.http
            .delete(format!("{}/api/results/{}", self.base_url, correlation_id))
            .send()
            .await
            .with_context(|| format!("cannot reach controller at {}", self.base_url))?
            .error_for_status()?;
        Ok(())
    }
}
