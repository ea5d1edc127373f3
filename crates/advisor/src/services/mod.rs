//! Collaborators the advisor talks to.
//!
//! The executor injects these when it builds an [`crate::Advisor`]:
//!
//! - [`WorkflowLookup`]: published topologies by workflow id
//! - [`InterruptQuery`] / [`InterruptQueue`]: pending execution interrupts
//! - [`InstanceSelector`]: host selection for rolling deployments
//! - [`InstanceSync`]: best-effort instance extraction after phase-steps
//! - [`ExpressionEvaluator`]: skip assertion evaluation
//!
//! Every call is a bounded, synchronous read except the two fire-and-forget
//! writes (`InterruptQueue::enqueue`, `InstanceSync::extract`). Failures are
//! reported as `anyhow::Error` and become
//! [`crate::AdvisorError::Collaborator`] when the advisor propagates them.

pub mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{ExecutionContext, ExecutionEvent};
use crate::topology::{PhaseStepType, Topology};

pub use memory::{
    InMemoryInstanceSelector, InMemoryInterrupts, InMemoryWorkflows, RecordingInstanceSync,
    StaticExpressionEvaluator,
};

/// Out-of-band signal raised against a running execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptKind {
    AbortAll,
    Rollback,
    PauseAll,
    ResumeAll,
}

/// Interrupt handed to the executor's interrupt queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterruptRecord {
    pub id: Uuid,
    pub execution_id: String,
    pub app_id: String,
    pub kind: InterruptKind,
    pub created_at: DateTime<Utc>,
}

impl InterruptRecord {
    pub fn new(execution_id: &str, app_id: &str, kind: InterruptKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id: execution_id.to_string(),
            app_id: app_id.to_string(),
            kind,
            created_at: Utc::now(),
        }
    }
}

/// Host selection request for the next rolling batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectionRequest {
    pub app_id: String,
    pub execution_id: String,
    pub infra_mapping_id: String,
    /// Hosts that must not be picked again, deduplicated.
    pub excluded: Vec<String>,
    pub count: usize,
}

/// Read access to published workflows.
pub trait WorkflowLookup: Send + Sync {
    /// `Ok(None)` when no workflow with that id is known.
    fn get(&self, workflow_id: &str) -> anyhow::Result<Option<Arc<Topology>>>;
}

/// Read access to pending execution interrupts.
pub trait InterruptQuery: Send + Sync {
    fn pending(&self, execution_id: &str) -> anyhow::Result<Vec<InterruptKind>>;
}

/// Write access to the executor's interrupt queue.
pub trait InterruptQueue: Send + Sync {
    fn enqueue(&self, record: InterruptRecord) -> anyhow::Result<()>;
}

/// Host inventory used to generate rolling phases.
pub trait InstanceSelector: Send + Sync {
    /// Hosts already deployed to (or excluded) for the current phase.
    fn excluded_instances(&self, context: &ExecutionContext) -> anyhow::Result<Vec<String>>;

    /// Infrastructure mappings resolved for the execution, in priority order.
    fn resolve_infra_mappings(&self, context: &ExecutionContext) -> anyhow::Result<Vec<String>>;

    fn select_instances(&self, request: &SelectionRequest) -> anyhow::Result<Vec<String>>;
}

/// Extracts deployed instances once a phase-step finishes.
pub trait InstanceSync: Send + Sync {
    fn extract(
        &self,
        phase_step_type: PhaseStepType,
        event: &ExecutionEvent,
        context: &ExecutionContext,
    ) -> anyhow::Result<()>;
}

/// Evaluates skip assertions against the execution context.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, context: &ExecutionContext) -> anyhow::Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_record_new() {
        let record = InterruptRecord::new("exec-1", "app-1", InterruptKind::AbortAll);
        assert_eq!(record.execution_id, "exec-1");
        assert_eq!(record.kind, InterruptKind::AbortAll);
        assert_ne!(record.id, InterruptRecord::new("exec-1", "app-1", InterruptKind::AbortAll).id);
    }

    #[test]
    fn test_interrupt_kind_serialization() {
        let json = serde_json::to_string(&InterruptKind::AbortAll).unwrap();
        assert_eq!(json, "\"ABORT_ALL\"");
    }
}
