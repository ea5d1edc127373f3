//! Immutable workflow topology.
//!
//! A [`Topology`] is assembled once by [`super::TopologyBuilder`] when a
//! workflow is published and only read afterwards. Phases live in two
//! arenas (forward and rollback) addressed through read-only index maps.

use std::collections::HashMap;

use super::types::{FailurePolicy, GraphNode, OrchestrationStyle, Phase, PhaseStep};

/// Location of a phase inside the topology arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhaseSlot {
    Forward(usize),
    Rollback(usize),
}

/// Published workflow topology.
#[derive(Debug, Clone)]
pub struct Topology {
    pub(crate) name: String,
    pub(crate) orchestration_style: OrchestrationStyle,
    pub(crate) phases: Vec<Phase>,
    pub(crate) rollback_phases: Vec<Phase>,
    pub(crate) phase_index: HashMap<String, PhaseSlot>,
    pub(crate) rollback_by_forward: HashMap<String, usize>,
    pub(crate) pre_deployment: PhaseStep,
    pub(crate) post_deployment: PhaseStep,
    pub(crate) rollback_provisioners: Option<PhaseStep>,
    pub(crate) failure_policies: Vec<FailurePolicy>,
    pub(crate) notify_groups: Vec<String>,
    pub(crate) graph: HashMap<String, Vec<GraphNode>>,
}

impl Topology {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn orchestration_style(&self) -> OrchestrationStyle {
        self.orchestration_style
    }

    /// Forward phases in declaration order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Rollback phases in registration order.
    pub fn rollback_phases(&self) -> &[Phase] {
        &self.rollback_phases
    }

    pub fn first_phase(&self) -> Option<&Phase> {
        self.phases.first()
    }

    /// Whether `name` is the last forward phase.
    pub fn is_last_phase(&self, name: &str) -> bool {
        self.phases.last().map(|p| p.name == name).unwrap_or(false)
    }

    /// Any phase (forward or rollback) by id.
    pub fn phase(&self, id: &str) -> Option<&Phase> {
        match self.phase_index.get(id)? {
            PhaseSlot::Forward(i) => self.phases.get(*i),
            PhaseSlot::Rollback(i) => self.rollback_phases.get(*i),
        }
    }

    /// Forward phase by name, with its position.
    pub fn forward_phase_by_name(&self, name: &str) -> Option<(usize, &Phase)> {
        self.phases.iter().enumerate().find(|(_, p)| p.name == name)
    }

    /// Rollback phase registered for a forward phase id.
    pub fn rollback_phase_for(&self, forward_phase_id: &str) -> Option<&Phase> {
        self.rollback_by_forward
            .get(forward_phase_id)
            .and_then(|i| self.rollback_phases.get(*i))
    }

    /// Rolling workflows reuse a single rollback phase for every index.
    pub fn shared_rollback_phase(&self) -> Option<&Phase> {
        self.rollback_phases.first()
    }

    pub fn pre_deployment(&self) -> &PhaseStep {
        &self.pre_deployment
    }

    pub fn post_deployment(&self) -> &PhaseStep {
        &self.post_deployment
    }

    pub fn rollback_provisioners(&self) -> Option<&PhaseStep> {
        self.rollback_provisioners.as_ref()
    }

    /// Workflow-wide policies in declaration order.
    pub fn failure_policies(&self) -> &[FailurePolicy] {
        &self.failure_policies
    }

    pub fn notify_groups(&self) -> &[String] {
        &self.notify_groups
    }

    /// Graph node `node_id` inside the sub-graph owned by `parent_id`.
    pub fn graph_node(&self, parent_id: &str, node_id: &str) -> Option<&GraphNode> {
        self.graph
            .get(parent_id)?
            .iter()
            .find(|node| node.id == node_id)
    }

    /// Locate the phase-step that owns a step, given the step's parent id
    /// and, when the step runs inside a phase, that phase's id.
    ///
    /// Checks pre-deployment, rollback-provisioners, post-deployment and
    /// finally the owning phase's own phase-steps.
    pub fn find_phase_step(&self, parent_id: &str, phase_id: Option<&str>) -> Option<&PhaseStep> {
        if parent_id == self.pre_deployment.id {
            return Some(&self.pre_deployment);
        }
        if let Some(rp) = &self.rollback_provisioners {
            if parent_id == rp.id {
                return Some(rp);
            }
        }
        if parent_id == self.post_deployment.id {
            return Some(&self.post_deployment);
        }
        self.phase(phase_id?)?.phase_step(parent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::PhaseStepType;
    use super::super::TopologyBuilder;
    use super::*;

    fn topology() -> Topology {
        TopologyBuilder::new("deploy-web", OrchestrationStyle::Canary)
            .pre_deployment(PhaseStep::new("pre", "Pre-Deployment", PhaseStepType::PreDeployment))
            .rollback_provisioners(PhaseStep::new(
                "rp",
                "Rollback Provisioners",
                PhaseStepType::RollbackProvisioners,
            ))
            .post_deployment(PhaseStep::new(
                "post",
                "Post-Deployment",
                PhaseStepType::PostDeployment,
            ))
            .phase(
                Phase::forward("p1", "Phase 1").with_phase_step(PhaseStep::new(
                    "p1-deploy",
                    "Deploy Service",
                    PhaseStepType::DeployService,
                )),
                Some(Phase::rollback_of("r1", "Rollback Phase 1", "Phase 1")),
            )
            .phase(Phase::forward("p2", "Phase 2"), None)
            .build()
            .unwrap()
    }

    #[test]
    fn test_phase_lookups() {
        let t = topology();
        assert_eq!(t.first_phase().unwrap().id, "p1");
        assert!(t.is_last_phase("Phase 2"));
        assert!(!t.is_last_phase("Phase 1"));
        assert_eq!(t.phase("r1").unwrap().name, "Rollback Phase 1");
        assert_eq!(t.forward_phase_by_name("Phase 2").unwrap().0, 1);
    }

    #[test]
    fn test_rollback_lookup_absent_is_none() {
        let t = topology();
        assert_eq!(t.rollback_phase_for("p1").unwrap().id, "r1");
        assert!(t.rollback_phase_for("p2").is_none());
        assert!(t.rollback_phase_for("unknown").is_none());
    }

    #[test]
    fn test_find_phase_step() {
        let t = topology();
        assert_eq!(t.find_phase_step("pre", None).unwrap().id, "pre");
        assert_eq!(t.find_phase_step("rp", None).unwrap().id, "rp");
        assert_eq!(
            t.find_phase_step("rp", Some("p1")).unwrap().phase_step_type,
            PhaseStepType::RollbackProvisioners
        );
        assert_eq!(t.find_phase_step("post", Some("p1")).unwrap().id, "post");
        assert_eq!(
            t.find_phase_step("p1-deploy", Some("p1")).unwrap().name,
            "Deploy Service"
        );
        assert!(t.find_phase_step("p1-deploy", None).is_none());
        assert!(t.find_phase_step("p1-deploy", Some("p2")).is_none());
        assert!(t.find_phase_step("p1-deploy", Some("nope")).is_none());
    }
}
