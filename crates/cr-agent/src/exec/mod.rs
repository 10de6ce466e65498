//! Execution engine
//!
//! Turns a task into a result: local shell execution under a hard
//! wall-clock timeout, or a single command over SSH (directly or through
//! a tunnel-broker session). Command outcomes (non-zero exits, stderr
//! noise) are normal results; only infrastructure failures (cannot
//! connect, cannot authenticate, timeout) carry an error kind, and even
//! those are encoded into the result rather than raised, so the relay
//! always has something to post.

mod local;
mod remote;

pub use local::execute_local;
pub use remote::execute_remote;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use cr_core::config::AgentConfig;
use cr_core::time::current_time_millis;
use cr_core::traits::TaskExecutor;
use cr_protocol::{CorrelationId, TaskKind, TaskResult};

use crate::tunnel::TunnelBroker;

/// Executes tasks for the transport loops
pub struct ExecutionEngine {
    exec_timeout: Duration,
    connect_timeout: Duration,
    broker: Arc<TunnelBroker>,
}

impl ExecutionEngine {
    /// Create an engine wired to the agent's tunnel broker
    pub fn new(config: &AgentConfig, broker: Arc<TunnelBroker>) -> Self {
        Self {
            exec_timeout: config.exec_timeout,
            connect_timeout: config.connect_timeout,
            broker,
        }
    }
}

#[async_trait]
impl TaskExecutor for ExecutionEngine {
    async fn execute(&self, correlation_id: CorrelationId, kind: TaskKind) -> TaskResult {
        tracing::info!("Executing {} task {}", kind.label(), correlation_id);

        let result = match kind {
            TaskKind::Shell { script } => execute_local(&script, self.exec_timeout).await,

            TaskKind::SshExec {
                target,
                command,
                jump,
            } => {
                match execute_remote(
                    &target,
                    &command,
                    jump.as_ref(),
                    &self.broker,
                    self.connect_timeout,
                    self.exec_timeout,
                )
                .await
                {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!("Task {} infrastructure failure: {}", correlation_id, e);
                        TaskResult::infra_failure(
                            e.result_kind(),
                            e.to_string(),
                            current_time_millis(),
                        )
                    }
                }
            }
        };

        tracing::info!(
            "Task {} finished: success={} returncode={:?}",
            correlation_id,
            result.success,
            result.returncode
        );
        result
    }
}
