//! Advisory decisions returned to the executor.

use serde::{Deserialize, Serialize};

use crate::topology::TimeoutAction;

/// What the executor should do next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvisoryDecision {
    /// Move on to `next_step`, optionally under another display name.
    Continue {
        next_step: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        child_state_machine_id: Option<String>,
    },
    /// Run the same step again after waiting.
    Retry { wait_seconds: u64 },
    /// Stop for manual intervention.
    Pause {
        /// Step properties snapshot. `None` when the graph node is unknown.
        params: Option<serde_json::Map<String, serde_json::Value>>,
        timeout_ms: u64,
        action_after_timeout: TimeoutAction,
        notify_groups: Vec<String>,
    },
    /// Transition to a rollback phase.
    Rollback {
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        /// Rolling phase whose variables the rollback phase re-binds.
        #[serde(skip_serializing_if = "Option::is_none")]
        rolling_phase_name: Option<String>,
    },
    /// Nothing is left to roll back.
    RollbackComplete,
    EndExecution,
    Ignore,
    /// Skip the step because its skip assertion held (or failed to evaluate).
    Skip {
        expression: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl AdvisoryDecision {
    pub fn continue_to(next_step: &str) -> Self {
        AdvisoryDecision::Continue {
            next_step: next_step.to_string(),
            display_name: None,
            child_state_machine_id: None,
        }
    }

    pub fn rollback_to(target: &str) -> Self {
        AdvisoryDecision::Rollback {
            target: target.to_string(),
            display_name: None,
            rolling_phase_name: None,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            AdvisoryDecision::Continue { .. } => "continue",
            AdvisoryDecision::Retry { .. } => "retry",
            AdvisoryDecision::Pause { .. } => "pause",
            AdvisoryDecision::Rollback { .. } => "rollback",
            AdvisoryDecision::RollbackComplete => "rollback_complete",
            AdvisoryDecision::EndExecution => "end_execution",
            AdvisoryDecision::Ignore => "ignore",
            AdvisoryDecision::Skip { .. } => "skip",
        }
    }
}

/// Why the advisor had nothing to say.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoAdviceReason {
    /// No policy or rule applies to this event.
    NotApplicable,
    /// A rollback or continuation target is missing from the topology.
    UnresolvableTarget,
    /// The instance was manually continued before.
    AlreadyContinued,
    /// The execution's workflow is unknown to the lookup.
    WorkflowNotFound,
}

/// Outcome of evaluating one event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Advice {
    /// Proceed with the executor's default behavior.
    NoAdvice { reason: NoAdviceReason },
    Decision { decision: AdvisoryDecision },
}

impl Advice {
    pub fn none(reason: NoAdviceReason) -> Self {
        Advice::NoAdvice { reason }
    }

    pub fn not_applicable() -> Self {
        Advice::none(NoAdviceReason::NotApplicable)
    }

    pub fn unresolvable() -> Self {
        Advice::none(NoAdviceReason::UnresolvableTarget)
    }

    pub fn decision(&self) -> Option<&AdvisoryDecision> {
        match self {
            Advice::Decision { decision } => Some(decision),
            Advice::NoAdvice { .. } => None,
        }
    }

    pub fn into_decision(self) -> Option<AdvisoryDecision> {
        match self {
            Advice::Decision { decision } => Some(decision),
            Advice::NoAdvice { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<NoAdviceReason> {
        match self {
            Advice::NoAdvice { reason } => Some(*reason),
            Advice::Decision { .. } => None,
        }
    }
}

impl From<AdvisoryDecision> for Advice {
    fn from(decision: AdvisoryDecision) -> Self {
        Advice::Decision { decision }
    }
}
