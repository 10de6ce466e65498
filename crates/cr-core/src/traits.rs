//! Trait seams shared across crates

use async_trait::async_trait;

use cr_protocol::{CorrelationId, TaskKind, TaskResult};

/// Executes one task to completion and produces its result.
///
/// Both transport loops (duplex and polling) drive their work through
/// this seam, so transport tests can substitute a recording stub for the
/// real execution engine.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run the task. Infrastructure failures are encoded into the
    /// returned result (`error_kind` set), never raised: from the
    /// transport's point of view execution always yields something to
    /// post under the correlation id.
    async fn execute(&self, correlation_id: CorrelationId, kind: TaskKind) -> TaskResult;
}
