//! Execution events and the context they are evaluated in.
//!
//! Events and contexts are created by the executor for every state
//! completion. The advisor only reads them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::topology::{FailureCause, PhaseStepType};

/// Terminal outcome reported for a state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Error,
    Paused,
    Aborted,
    Rejected,
    Expired,
    Skipped,
    Running,
    Waiting,
}

impl ExecutionStatus {
    /// Statuses that count as a bad outcome for a forward phase.
    pub fn is_negative(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Failed
                | ExecutionStatus::Error
                | ExecutionStatus::Aborted
                | ExecutionStatus::Rejected
                | ExecutionStatus::Expired
        )
    }

    /// Statuses that trigger failure-policy resolution.
    pub fn is_failure(self) -> bool {
        matches!(self, ExecutionStatus::Failed | ExecutionStatus::Error)
    }
}

/// Phase payload of a [`StepKind::Phase`] event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseRef {
    pub rollback: bool,
    /// Forward phase undone by this phase, when `rollback` is set.
    #[serde(default)]
    pub rollback_of_phase_name: Option<String>,
}

/// Kind of state an event was raised for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Phase(PhaseRef),
    PhaseStep { phase_step_type: PhaseStepType },
    SubWorkflow,
    Fork,
    Repeat,
    /// A step that does actual work, tagged with its implementation type.
    Leaf { step_type: String },
}

impl StepKind {
    pub fn forward_phase() -> Self {
        StepKind::Phase(PhaseRef {
            rollback: false,
            rollback_of_phase_name: None,
        })
    }

    pub fn rollback_phase(rollback_of: &str) -> Self {
        StepKind::Phase(PhaseRef {
            rollback: true,
            rollback_of_phase_name: Some(rollback_of.to_string()),
        })
    }

    pub fn leaf(step_type: &str) -> Self {
        StepKind::Leaf {
            step_type: step_type.to_string(),
        }
    }

    /// Composite kinds group other steps; retry and pause are illegal there.
    pub fn is_composite(&self) -> bool {
        !matches!(self, StepKind::Leaf { .. })
    }

    pub fn as_phase(&self) -> Option<&PhaseRef> {
        match self {
            StepKind::Phase(phase) => Some(phase),
            _ => None,
        }
    }

    pub fn phase_step_type(&self) -> Option<PhaseStepType> {
        match self {
            StepKind::PhaseStep { phase_step_type } => Some(*phase_step_type),
            _ => None,
        }
    }
}

/// Template binding of a step, copied into pause snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepTemplate {
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// One completion of a state, as reported by the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionEvent {
    pub step_id: String,
    pub step_name: String,
    pub kind: StepKind,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub status: ExecutionStatus,
    /// Causes reported by the step. Empty when unknown.
    #[serde(default)]
    pub failure_causes: BTreeSet<FailureCause>,
    #[serde(default)]
    pub template: Option<StepTemplate>,
}

impl ExecutionEvent {
    pub fn new(step_id: &str, step_name: &str, kind: StepKind, status: ExecutionStatus) -> Self {
        Self {
            step_id: step_id.to_string(),
            step_name: step_name.to_string(),
            kind,
            parent_id: None,
            status,
            failure_causes: BTreeSet::new(),
            template: None,
        }
    }

    pub fn with_parent(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self
    }

    pub fn with_causes(mut self, causes: impl IntoIterator<Item = FailureCause>) -> Self {
        self.failure_causes = causes.into_iter().collect();
        self
    }

    pub fn with_template(mut self, template: StepTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn is_phase(&self) -> bool {
        matches!(self.kind, StepKind::Phase(_))
    }
}

/// A previous attempt of the current step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    pub status: ExecutionStatus,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

/// The running state instance the event belongs to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepInstance {
    pub state_name: String,
    /// Display name; carries the rolling index ("Rolling Phase 3").
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub child_state_machine_id: Option<String>,
    #[serde(default)]
    pub rollback: bool,
    /// Earlier attempts of this step, oldest first.
    #[serde(default)]
    pub attempt_history: Vec<AttemptRecord>,
    /// Names of the phases executed so far, in execution order.
    #[serde(default)]
    pub executed_phases: Vec<String>,
    /// Set once a user manually continued this instance.
    #[serde(default)]
    pub has_already_continued: bool,
}

impl StepInstance {
    pub fn new(state_name: &str, display_name: &str) -> Self {
        Self {
            state_name: state_name.to_string(),
            display_name: display_name.to_string(),
            ..Default::default()
        }
    }

    pub fn has_executed(&self, phase_name: &str) -> bool {
        self.executed_phases.iter().any(|p| p == phase_name)
    }
}

/// What kind of execution the event belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionKind {
    #[default]
    Orchestration,
    Pipeline,
}

/// Phase the event was raised in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseContext {
    pub id: String,
    pub name: String,
}

/// Execution-level context handed in with every event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub app_id: String,
    pub account_id: String,
    pub workflow_id: String,
    #[serde(default)]
    pub execution_kind: ExecutionKind,
    /// Rolling executions driven by the newer container deployer number
    /// their phases themselves.
    #[serde(default)]
    pub v2_rolling: bool,
    pub instance: StepInstance,
    #[serde(default)]
    pub phase: Option<PhaseContext>,
    /// Hosts pinned by the user at trigger time.
    #[serde(default)]
    pub execution_hosts: Vec<String>,
    #[serde(default)]
    pub infra_mapping_id: Option<String>,
}

impl ExecutionContext {
    pub fn new(execution_id: &str, workflow_id: &str, instance: StepInstance) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            app_id: String::new(),
            account_id: String::new(),
            workflow_id: workflow_id.to_string(),
            execution_kind: ExecutionKind::Orchestration,
            v2_rolling: false,
            instance,
            phase: None,
            execution_hosts: Vec::new(),
            infra_mapping_id: None,
        }
    }

    pub fn with_ids(mut self, app_id: &str, account_id: &str) -> Self {
        self.app_id = app_id.to_string();
        self.account_id = account_id.to_string();
        self
    }

    pub fn in_phase(mut self, id: &str, name: &str) -> Self {
        self.phase = Some(PhaseContext {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn attempts(&self) -> usize {
        self.instance.attempt_history.len()
    }
}
