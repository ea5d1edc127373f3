//! Workflow document parser.
//!
//! Parses a published workflow document (YAML) into a [`Topology`].
//! Rollback phases are declared inline under the forward phase they undo,
//! which keeps the forward-to-rollback mapping well formed by construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, AdvisorResult};

use super::builder::TopologyBuilder;
use super::model::Topology;
use super::types::{
    FailurePolicy, GraphNode, OrchestrationStyle, Phase, PhaseStep, RepairAction,
};

/// Forward phase declaration with its inline rollback phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDocument {
    #[serde(flatten)]
    pub phase: Phase,

    #[serde(default)]
    pub rollback: Option<Phase>,
}

/// Published workflow document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub name: String,

    #[serde(default)]
    pub orchestration: OrchestrationStyle,

    #[serde(default)]
    pub pre_deployment: Option<PhaseStep>,

    #[serde(default)]
    pub post_deployment: Option<PhaseStep>,

    #[serde(default)]
    pub rollback_provisioners: Option<PhaseStep>,

    #[serde(default)]
    pub phases: Vec<PhaseDocument>,

    #[serde(default)]
    pub failure_policies: Vec<FailurePolicy>,

    #[serde(default)]
    pub notification_groups: Vec<String>,

    /// Step graph nodes keyed by owning phase-step id.
    #[serde(default)]
    pub graph: HashMap<String, Vec<GraphNode>>,
}

/// Parse a YAML string into a Topology.
pub fn parse_topology(yaml_content: &str) -> AdvisorResult<Topology> {
    let document: WorkflowDocument = serde_yaml::from_str(yaml_content)?;
    validate_document(&document)?;
    into_topology(document)
}

/// Validate a parsed document before building.
pub fn validate_document(document: &WorkflowDocument) -> AdvisorResult<()> {
    if document.name.trim().is_empty() {
        return Err(AdvisorError::Validation(
            "Workflow name must not be empty".to_string(),
        ));
    }

    validate_policies(&document.failure_policies, "workflow")?;

    let distinguished = [
        document.pre_deployment.as_ref(),
        document.post_deployment.as_ref(),
        document.rollback_provisioners.as_ref(),
    ];
    for phase_step in distinguished.into_iter().flatten() {
        validate_phase_step(phase_step)?;
    }

    for entry in &document.phases {
        if entry.phase.is_rollback {
            return Err(AdvisorError::Validation(format!(
                "Phase '{}' is declared as forward but flagged as rollback",
                entry.phase.name
            )));
        }
        for phase_step in &entry.phase.phase_steps {
            validate_phase_step(phase_step)?;
        }
        if let Some(rollback) = &entry.rollback {
            for phase_step in &rollback.phase_steps {
                validate_phase_step(phase_step)?;
            }
        }
    }

    if document.orchestration.is_rolling() && document.phases.len() > 1 {
        return Err(AdvisorError::Validation(format!(
            "Rolling workflow '{}' must declare a single phase template (got {})",
            document.name,
            document.phases.len()
        )));
    }

    Ok(())
}

fn validate_phase_step(phase_step: &PhaseStep) -> AdvisorResult<()> {
    validate_policies(
        &phase_step.failure_policies,
        &format!("phase-step '{}'", phase_step.name),
    )?;

    for (idx, strategy) in phase_step.skip_strategies.iter().enumerate() {
        if strategy.assertion_expression.trim().is_empty() {
            return Err(AdvisorError::Validation(format!(
                "Phase-step '{}': skip_strategies[{}] has an empty assertion",
                phase_step.name, idx
            )));
        }
    }
    Ok(())
}

fn validate_policies(policies: &[FailurePolicy], owner: &str) -> AdvisorResult<()> {
    for (idx, policy) in policies.iter().enumerate() {
        let unrecognized = policy.repair_action == RepairAction::Unrecognized
            || policy.repair_action_after_retries_exhausted == Some(RepairAction::Unrecognized);
        if unrecognized {
            return Err(AdvisorError::Validation(format!(
                "{}: failure_policies[{}] has an unrecognized repair action",
                owner, idx
            )));
        }
        if policy.repair_action == RepairAction::Retry
            && policy.repair_action_after_retries_exhausted.is_none()
        {
            tracing::warn!(
                owner = %owner,
                index = idx,
                "Retry policy without an action after retries; exhaustion yields no advice"
            );
        }
    }
    Ok(())
}

fn into_topology(document: WorkflowDocument) -> AdvisorResult<Topology> {
    let mut builder = TopologyBuilder::new(&document.name, document.orchestration);

    if let Some(pre) = document.pre_deployment {
        builder = builder.pre_deployment(pre);
    }
    if let Some(post) = document.post_deployment {
        builder = builder.post_deployment(post);
    }
    if let Some(rp) = document.rollback_provisioners {
        builder = builder.rollback_provisioners(rp);
    }
    for entry in document.phases {
        let rollback = entry.rollback.map(|mut r| {
            r.is_rollback = true;
            r
        });
        builder = builder.phase(entry.phase, rollback);
    }
    for policy in document.failure_policies {
        builder = builder.failure_policy(policy);
    }
    for group in &document.notification_groups {
        builder = builder.notify_group(group);
    }
    for (parent_id, nodes) in document.graph {
        builder = builder.graph(&parent_id, nodes);
    }

    builder.build()
}
