//! HTTP polling transport (deprecated)
//!
//! The original fallback: drain the task queue on a fixed interval,
//! execute, post results. Kept for environments where a persistent
//! connection cannot be held open; new deployments should use the
//! duplex transport. There is no delivery acknowledgment: once the
//! server answers a poll, those tasks are the agent's, and a network
//! failure before results are posted loses them.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use cr_core::config::AgentConfig;
use cr_core::error::TransportError;
use cr_core::traits::TaskExecutor;
use cr_core::types::{AgentId, TaskSpec};
use cr_protocol::{CorrelationId, TaskResult};

use crate::duplex::ExponentialBackoff;

#[derive(Debug, Deserialize)]
struct PollTasksBody {
    tasks: Vec<TaskSpec>,
}

#[derive(Debug, Serialize)]
struct PostResultBody {
    correlation_id: CorrelationId,
    result: TaskResult,
}

/// Polls the controller's agent-facing HTTP endpoints
pub struct PollingClient {
    config: AgentConfig,
    agent_id: AgentId,
    executor: Arc<dyn TaskExecutor>,
    http: reqwest::Client,
}

impl PollingClient {
    /// Create a new polling client
    pub fn new(config: AgentConfig, agent_id: AgentId, executor: Arc<dyn TaskExecutor>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.connect_timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            agent_id,
            executor,
            http,
        }
    }

    /// Poll until cancelled. Server errors back off exponentially and
    /// recover to the regular interval on the next success.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), TransportError> {
        let mut backoff = ExponentialBackoff::from_config(&self.config.backoff);
        let mut delay = Duration::ZERO;

        tracing::info!(
            "Polling {} every {:?} as {}",
            self.config.controller_http_url,
            self.config.poll_interval,
            self.agent_id
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Polling loop shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match self.poll_once().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::debug!("Executed {} polled tasks", count);
                    }
                    backoff.reset();
                    delay = self.config.poll_interval;
                }
                Err(e) => {
                    delay = backoff.next_delay();
                    tracing::warn!("Poll failed: {}. Retrying in {:?}", e, delay);
                }
            }
        }
    }

    /// One poll cycle: drain, execute in order, post each result.
    async fn poll_once(&self) -> Result<usize, TransportError> {
        let url = format!(
            "{}/api/agents/{}/tasks",
            self.config.controller_http_url, self.agent_id
        );

        let body: PollTasksBody = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| TransportError::MalformedRequest(e.to_string()))?;

        let count = body.tasks.len();
        for task in body.tasks {
            let result = self.executor.execute(task.correlation_id, task.kind).await;
            self.post_result(task.correlation_id, result).await;
        }
        Ok(count)
    }

    /// Post one result. Failure is logged, not retried: the task already
    /// left the queue, so the controller's caller will time out on the
    /// pending correlation id.
    async fn post_result(&self, correlation_id: CorrelationId, result: TaskResult) {
        let url = format!(
            "{}/api/agents/{}/results",
            self.config.controller_http_url, self.agent_id
        );
        let body = PostResultBody {
            correlation_id,
            result,
        };

        match self.http.post(&url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::warn!(
                    "Result for {} rejected with status {}",
                    correlation_id,
                    response.status()
                );
            }
            Err(e) => {
                tracing::warn!("Failed to post result for {}: {}", correlation_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_body_shape_matches_controller() {
        let json = r#"{
            "tasks": [{
                "correlation_id": "9f2c1d4e-0000-4000-8000-000000000001",
                "agent_id": "agent-poll",
                "kind": {"shell": {"script": "echo hi"}},
                "enqueued_at_ms": 1
            }]
        }"#;
        let body: PollTasksBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.tasks.len(), 1);
        assert_eq!(body.tasks[0].agent_id.as_str(), "agent-poll");
    }

    #[test]
    fn test_post_body_embeds_result() {
        let body = PostResultBody {
            correlation_id: CorrelationId::generate(),
            result: TaskResult::completed("hi\n".into(), String::new(), 0, 1),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["result"]["stdout"], "hi\n");
        assert!(json["correlation_id"].is_string());
    }
}
