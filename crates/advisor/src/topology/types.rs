//! Workflow topology value types.
//!
//! These types double as the published workflow document format (see
//! [`super::parser`]), so every optional field carries a serde default.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Orchestration style of a workflow. Only `Rolling` numbers its phases at
/// runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestrationStyle {
    #[default]
    Basic,
    Rolling,
    Canary,
    BlueGreen,
    MultiService,
    Build,
}

impl OrchestrationStyle {
    pub fn is_rolling(self) -> bool {
        matches!(self, OrchestrationStyle::Rolling)
    }
}

/// Failure cause reported by a step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCause {
    Connectivity,
    Authentication,
    Authorization,
    Verification,
    ApplicationError,
    DelegateProvisioning,
    Expired,
    PolicyEvaluation,
}

/// Category of response to a failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairAction {
    Ignore,
    EndExecution,
    AbortAll,
    PauseForManualAction,
    RollbackPhase,
    RollbackWorkflow,
    Retry,
    /// Any tag this build does not know. Rejected at publish time and
    /// reported as an error if it still reaches the engine.
    #[serde(other)]
    Unrecognized,
}

impl std::fmt::Display for RepairAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RepairAction::Ignore => "IGNORE",
            RepairAction::EndExecution => "END_EXECUTION",
            RepairAction::AbortAll => "ABORT_ALL",
            RepairAction::PauseForManualAction => "PAUSE_FOR_MANUAL_ACTION",
            RepairAction::RollbackPhase => "ROLLBACK_PHASE",
            RepairAction::RollbackWorkflow => "ROLLBACK_WORKFLOW",
            RepairAction::Retry => "RETRY",
            RepairAction::Unrecognized => "UNRECOGNIZED",
        };
        write!(f, "{}", s)
    }
}

/// Where a workflow-level policy may apply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionScope {
    /// Anywhere in the workflow.
    #[default]
    Workflow,
    /// Only for events raised inside a phase.
    WorkflowPhase,
}

/// What the executor does once a manual-intervention pause times out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeoutAction {
    EndExecution,
    Ignore,
    MarkSuccess,
    RollbackWorkflow,
    AbortAll,
}

/// Declarative rule mapping failure causes to a repair action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailurePolicy {
    /// Causes this policy handles. Empty matches any cause.
    #[serde(default)]
    pub failure_causes: BTreeSet<FailureCause>,

    pub repair_action: RepairAction,

    #[serde(default)]
    pub retry_count: u32,

    /// Backoff schedule. The last entry repeats once the list runs out.
    #[serde(default)]
    pub retry_intervals_seconds: Vec<u64>,

    #[serde(default)]
    pub repair_action_after_retries_exhausted: Option<RepairAction>,

    /// Step names this policy is scoped to. Empty matches any step.
    #[serde(default)]
    pub applicable_step_names: Vec<String>,

    #[serde(default)]
    pub execution_scope: ExecutionScope,

    #[serde(default)]
    pub manual_intervention_timeout_ms: Option<u64>,

    #[serde(default)]
    pub action_after_timeout: Option<TimeoutAction>,
}

impl FailurePolicy {
    /// A policy matching every cause and step.
    pub fn new(repair_action: RepairAction) -> Self {
        Self {
            failure_causes: BTreeSet::new(),
            repair_action,
            retry_count: 0,
            retry_intervals_seconds: Vec::new(),
            repair_action_after_retries_exhausted: None,
            applicable_step_names: Vec::new(),
            execution_scope: ExecutionScope::Workflow,
            manual_intervention_timeout_ms: None,
            action_after_timeout: None,
        }
    }

    pub fn with_causes(mut self, causes: impl IntoIterator<Item = FailureCause>) -> Self {
        self.failure_causes = causes.into_iter().collect();
        self
    }

    pub fn with_retry(
        mut self,
        retry_count: u32,
        intervals_seconds: Vec<u64>,
        after_exhausted: RepairAction,
    ) -> Self {
        self.retry_count = retry_count;
        self.retry_intervals_seconds = intervals_seconds;
        self.repair_action_after_retries_exhausted = Some(after_exhausted);
        self
    }

    pub fn for_steps(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.applicable_step_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scope(mut self, scope: ExecutionScope) -> Self {
        self.execution_scope = scope;
        self
    }

    pub fn with_manual_timeout(mut self, timeout_ms: u64, action: TimeoutAction) -> Self {
        self.manual_intervention_timeout_ms = Some(timeout_ms);
        self.action_after_timeout = Some(action);
        self
    }

    /// The policy to re-dispatch once retries are exhausted (or retry is not
    /// legal at the failing step). Retry budget is consumed; pause settings
    /// carry over.
    pub fn after_retries(&self) -> Option<FailurePolicy> {
        let action = self.repair_action_after_retries_exhausted?;
        let mut derived = FailurePolicy::new(action);
        derived.manual_intervention_timeout_ms = self.manual_intervention_timeout_ms;
        derived.action_after_timeout = self.action_after_timeout;
        Some(derived)
    }
}

/// Kind of a phase-step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseStepType {
    PreDeployment,
    PostDeployment,
    RollbackProvisioners,
    ProvisionNode,
    DeployService,
    VerifyService,
    Wrapup,
    #[default]
    #[serde(other)]
    Other,
}

/// A single step declared inside a phase-step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDef {
    pub id: String,
    pub name: String,
    /// Step implementation tag, e.g. `SHELL_SCRIPT` or `TERRAFORM_PROVISION`.
    #[serde(rename = "type")]
    pub step_type: String,
}

/// Which steps a skip strategy covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipScope {
    AllSteps,
    SpecificSteps,
}

/// Skip a step when its assertion expression evaluates to true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepSkipStrategy {
    pub scope: SkipScope,
    #[serde(default)]
    pub step_ids: Vec<String>,
    pub assertion_expression: String,
}

impl StepSkipStrategy {
    pub fn covers(&self, step_id: &str) -> bool {
        match self.scope {
            SkipScope::AllSteps => true,
            SkipScope::SpecificSteps => self.step_ids.iter().any(|id| id == step_id),
        }
    }
}

/// Named group of steps within a phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseStep {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub phase_step_type: PhaseStepType,
    #[serde(default)]
    pub steps: Vec<StepDef>,
    /// Take precedence over workflow-level policies.
    #[serde(default)]
    pub failure_policies: Vec<FailurePolicy>,
    #[serde(default)]
    pub skip_strategies: Vec<StepSkipStrategy>,
}

impl PhaseStep {
    pub fn new(id: &str, name: &str, phase_step_type: PhaseStepType) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            phase_step_type,
            steps: Vec::new(),
            failure_policies: Vec::new(),
            skip_strategies: Vec::new(),
        }
    }

    pub fn with_step(mut self, id: &str, name: &str, step_type: &str) -> Self {
        self.steps.push(StepDef {
            id: id.to_string(),
            name: name.to_string(),
            step_type: step_type.to_string(),
        });
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policies.push(policy);
        self
    }

    pub fn with_skip_strategy(mut self, strategy: StepSkipStrategy) -> Self {
        self.skip_strategies.push(strategy);
        self
    }

    /// Whether any declared step has one of the given types.
    pub fn contains_step_type<F>(&self, mut is_match: F) -> bool
    where
        F: FnMut(&str) -> bool,
    {
        self.steps.iter().any(|s| is_match(&s.step_type))
    }
}

/// Top-level unit of a deployment workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_rollback: bool,
    /// For rollback phases, the name of the forward phase they undo.
    #[serde(default)]
    pub rollback_of_phase_name: Option<String>,
    #[serde(default)]
    pub phase_steps: Vec<PhaseStep>,
}

impl Phase {
    pub fn forward(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            is_rollback: false,
            rollback_of_phase_name: None,
            phase_steps: Vec::new(),
        }
    }

    pub fn rollback_of(id: &str, name: &str, forward_name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            is_rollback: true,
            rollback_of_phase_name: Some(forward_name.to_string()),
            phase_steps: Vec::new(),
        }
    }

    pub fn with_phase_step(mut self, phase_step: PhaseStep) -> Self {
        self.phase_steps.push(phase_step);
        self
    }

    pub fn phase_step(&self, id: &str) -> Option<&PhaseStep> {
        self.phase_steps.iter().find(|ps| ps.id == id)
    }
}

/// Graph node of a step, holding the properties it was configured with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_action_display() {
        assert_eq!(RepairAction::RollbackWorkflow.to_string(), "ROLLBACK_WORKFLOW");
        assert_eq!(
            RepairAction::PauseForManualAction.to_string(),
            "PAUSE_FOR_MANUAL_ACTION"
        );
    }

    #[test]
    fn test_unknown_repair_action_deserializes_as_unrecognized() {
        let action: RepairAction = serde_json::from_str("\"SELF_DESTRUCT\"").unwrap();
        assert_eq!(action, RepairAction::Unrecognized);
    }

    #[test]
    fn test_after_retries_keeps_pause_settings() {
        let policy = FailurePolicy::new(RepairAction::Retry)
            .with_retry(3, vec![5], RepairAction::PauseForManualAction)
            .with_manual_timeout(60_000, TimeoutAction::MarkSuccess);

        let derived = policy.after_retries().unwrap();
        assert_eq!(derived.repair_action, RepairAction::PauseForManualAction);
        assert_eq!(derived.retry_count, 0);
        assert_eq!(derived.manual_intervention_timeout_ms, Some(60_000));
        assert_eq!(derived.action_after_timeout, Some(TimeoutAction::MarkSuccess));
        assert!(derived.after_retries().is_none());
    }

    #[test]
    fn test_skip_strategy_coverage() {
        let all = StepSkipStrategy {
            scope: SkipScope::AllSteps,
            step_ids: vec![],
            assertion_expression: "true".to_string(),
        };
        let specific = StepSkipStrategy {
            scope: SkipScope::SpecificSteps,
            step_ids: vec!["s1".to_string()],
            assertion_expression: "true".to_string(),
        };
        assert!(all.covers("anything"));
        assert!(specific.covers("s1"));
        assert!(!specific.covers("s2"));
    }

    #[test]
    fn test_phase_step_type_other() {
        let t: PhaseStepType = serde_json::from_str("\"CONTAINER_SETUP\"").unwrap();
        assert_eq!(t, PhaseStepType::Other);
    }
}
