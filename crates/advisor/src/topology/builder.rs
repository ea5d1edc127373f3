//! Publish-time topology construction.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{AdvisorError, AdvisorResult};

use super::model::{PhaseSlot, Topology};
use super::types::{
    FailurePolicy, GraphNode, OrchestrationStyle, Phase, PhaseStep, PhaseStepType,
};

/// Builds an immutable [`Topology`], checking its invariants once.
pub struct TopologyBuilder {
    name: String,
    orchestration_style: OrchestrationStyle,
    phases: Vec<(Phase, Option<Phase>)>,
    pre_deployment: Option<PhaseStep>,
    post_deployment: Option<PhaseStep>,
    rollback_provisioners: Option<PhaseStep>,
    failure_policies: Vec<FailurePolicy>,
    notify_groups: Vec<String>,
    graph: HashMap<String, Vec<GraphNode>>,
}

impl TopologyBuilder {
    pub fn new(name: &str, orchestration_style: OrchestrationStyle) -> Self {
        Self {
            name: name.to_string(),
            orchestration_style,
            phases: Vec::new(),
            pre_deployment: None,
            post_deployment: None,
            rollback_provisioners: None,
            failure_policies: Vec::new(),
            notify_groups: Vec::new(),
            graph: HashMap::new(),
        }
    }

    /// Append a forward phase, optionally with the rollback phase that undoes it.
    pub fn phase(mut self, forward: Phase, rollback: Option<Phase>) -> Self {
        self.phases.push((forward, rollback));
        self
    }

    pub fn pre_deployment(mut self, phase_step: PhaseStep) -> Self {
        self.pre_deployment = Some(phase_step);
        self
    }

    pub fn post_deployment(mut self, phase_step: PhaseStep) -> Self {
        self.post_deployment = Some(phase_step);
        self
    }

    pub fn rollback_provisioners(mut self, phase_step: PhaseStep) -> Self {
        self.rollback_provisioners = Some(phase_step);
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policies.push(policy);
        self
    }

    pub fn notify_group(mut self, group: &str) -> Self {
        self.notify_groups.push(group.to_string());
        self
    }

    /// Register the step graph owned by a phase-step.
    pub fn graph(mut self, parent_id: &str, nodes: Vec<GraphNode>) -> Self {
        self.graph.insert(parent_id.to_string(), nodes);
        self
    }

    /// Validate and freeze the topology.
    pub fn build(self) -> AdvisorResult<Topology> {
        let pre_deployment = self.pre_deployment.unwrap_or_else(|| {
            PhaseStep::new("pre-deployment", "Pre-Deployment", PhaseStepType::PreDeployment)
        });
        let post_deployment = self.post_deployment.unwrap_or_else(|| {
            PhaseStep::new("post-deployment", "Post-Deployment", PhaseStepType::PostDeployment)
        });

        let mut phases = Vec::with_capacity(self.phases.len());
        let mut rollback_phases = Vec::new();
        let mut phase_index = HashMap::new();
        let mut rollback_by_forward = HashMap::new();
        let mut forward_names = HashSet::new();

        for (forward, rollback) in self.phases {
            if forward.is_rollback {
                return Err(AdvisorError::CorruptTopology(format!(
                    "Phase '{}' is flagged as rollback but registered as forward",
                    forward.name
                )));
            }
            if !forward_names.insert(forward.name.clone()) {
                return Err(AdvisorError::CorruptTopology(format!(
                    "Duplicate phase name: {}",
                    forward.name
                )));
            }
            insert_phase_id(&mut phase_index, &forward.id, PhaseSlot::Forward(phases.len()))?;

            if let Some(mut rollback) = rollback {
                if !rollback.is_rollback {
                    return Err(AdvisorError::CorruptTopology(format!(
                        "Rollback phase '{}' for '{}' is not flagged as rollback",
                        rollback.name, forward.name
                    )));
                }
                match rollback.rollback_of_phase_name.as_deref() {
                    None => rollback.rollback_of_phase_name = Some(forward.name.clone()),
                    Some(name) if name == forward.name => {}
                    Some(name) => {
                        return Err(AdvisorError::CorruptTopology(format!(
                            "Rollback phase '{}' undoes '{}' but is registered for '{}'",
                            rollback.name, name, forward.name
                        )));
                    }
                }
                let slot = rollback_phases.len();
                insert_phase_id(&mut phase_index, &rollback.id, PhaseSlot::Rollback(slot))?;
                rollback_by_forward.insert(forward.id.clone(), slot);
                rollback_phases.push(rollback);
            }

            phases.push(forward);
        }

        let mut phase_step_ids = HashSet::new();
        let distinguished = [
            Some(&pre_deployment),
            Some(&post_deployment),
            self.rollback_provisioners.as_ref(),
        ];
        let nested = phases
            .iter()
            .chain(rollback_phases.iter())
            .flat_map(|p| p.phase_steps.iter());
        for phase_step in distinguished.into_iter().flatten().chain(nested) {
            if !phase_step_ids.insert(phase_step.id.as_str()) {
                return Err(AdvisorError::CorruptTopology(format!(
                    "Duplicate phase-step id: {}",
                    phase_step.id
                )));
            }
        }

        debug!(
            workflow = %self.name,
            phases = phases.len(),
            rollback_phases = rollback_phases.len(),
            "Topology built"
        );

        Ok(Topology {
            name: self.name,
            orchestration_style: self.orchestration_style,
            phases,
            rollback_phases,
            phase_index,
            rollback_by_forward,
            pre_deployment,
            post_deployment,
            rollback_provisioners: self.rollback_provisioners,
            failure_policies: self.failure_policies,
            notify_groups: self.notify_groups,
            graph: self.graph,
        })
    }
}

fn insert_phase_id(
    index: &mut HashMap<String, PhaseSlot>,
    id: &str,
    slot: PhaseSlot,
) -> AdvisorResult<()> {
    if index.insert(id.to_string(), slot).is_some() {
        return Err(AdvisorError::CorruptTopology(format!(
            "Duplicate phase id: {}",
            id
        )));
    }
    Ok(())
}
