//! Shared test topologies and a wired-up advisor.

use std::sync::Arc;

use serde_json::json;

use crate::config::AdvisorConfig;
use crate::services::{
    InMemoryInstanceSelector, InMemoryInterrupts, InMemoryWorkflows, RecordingInstanceSync,
    StaticExpressionEvaluator,
};
use crate::topology::{
    FailurePolicy, GraphNode, OrchestrationStyle, Phase, PhaseStep, PhaseStepType, Topology,
    TopologyBuilder,
};

use super::advisor::{Advisor, Collaborators};

fn deploy_step(id: &str, policies: &[FailurePolicy]) -> PhaseStep {
    let mut phase_step = PhaseStep::new(id, "Deploy Service", PhaseStepType::DeployService)
        .with_step("s-install", "Install", "SHELL_SCRIPT");
    phase_step.failure_policies = policies.to_vec();
    phase_step
}

fn install_node() -> GraphNode {
    let properties = json!({ "command": "./install.sh", "timeoutMillis": 60000 });
    GraphNode {
        id: "s-install".to_string(),
        properties: properties.as_object().cloned().unwrap_or_default(),
    }
}

/// Three canary phases. Phases 1 and 2 have rollback phases, phase 3 does
/// not. Phase 2's deploy step carries `step_policies`.
pub(crate) fn canary_with(
    step_policies: Vec<FailurePolicy>,
    workflow_policies: Vec<FailurePolicy>,
) -> Topology {
    let mut builder = TopologyBuilder::new("deploy-web", OrchestrationStyle::Canary)
        .pre_deployment(
            PhaseStep::new("pre", "Pre-Deployment", PhaseStepType::PreDeployment)
                .with_step("pre-check", "Check Access", "SHELL_SCRIPT"),
        )
        .post_deployment(PhaseStep::new("post", "Post-Deployment", PhaseStepType::PostDeployment))
        .phase(
            Phase::forward("p1", "Phase 1").with_phase_step(deploy_step("p1-deploy", &[])),
            Some(Phase::rollback_of("r1", "Rollback Phase 1", "Phase 1")),
        )
        .phase(
            Phase::forward("p2", "Phase 2")
                .with_phase_step(deploy_step("p2-deploy", &step_policies)),
            Some(Phase::rollback_of("r2", "Rollback Phase 2", "Phase 2")),
        )
        .phase(Phase::forward("p3", "Phase 3"), None)
        .notify_group("release-managers")
        .graph("p2-deploy", vec![install_node()]);
    for policy in workflow_policies {
        builder = builder.failure_policy(policy);
    }
    builder.build().unwrap()
}

pub(crate) fn canary_topology() -> Topology {
    canary_with(vec![], vec![])
}

/// Canary workflow whose pre-deployment provisions infrastructure.
pub(crate) fn provisioned_topology() -> Topology {
    provisioned_with(vec![], vec![])
}

/// Provisioned workflow whose rollback-provisioners step (`rp`, with the
/// `tf-destroy` step) carries `rp_policies`.
pub(crate) fn provisioned_with(
    rp_policies: Vec<FailurePolicy>,
    workflow_policies: Vec<FailurePolicy>,
) -> Topology {
    let mut rollback_provisioners =
        PhaseStep::new("rp", "Rollback Provisioners", PhaseStepType::RollbackProvisioners)
            .with_step("tf-destroy", "Destroy", "TERRAFORM_ROLLBACK");
    rollback_provisioners.failure_policies = rp_policies;

    let mut builder = TopologyBuilder::new("deploy-infra", OrchestrationStyle::Canary)
        .pre_deployment(
            PhaseStep::new("pre", "Pre-Deployment", PhaseStepType::PreDeployment)
                .with_step("tf", "Provision", "TERRAFORM_PROVISION"),
        )
        .rollback_provisioners(rollback_provisioners)
        .phase(
            Phase::forward("p1", "Phase 1"),
            Some(Phase::rollback_of("r1", "Rollback Phase 1", "Phase 1")),
        )
        .phase(
            Phase::forward("p2", "Phase 2"),
            Some(Phase::rollback_of("r2", "Rollback Phase 2", "Phase 2")),
        );
    for policy in workflow_policies {
        builder = builder.failure_policy(policy);
    }
    builder.build().unwrap()
}

/// Rolling workflow: one phase template and one shared rollback phase.
pub(crate) fn rolling_topology() -> Topology {
    TopologyBuilder::new("rolling-web", OrchestrationStyle::Rolling)
        .pre_deployment(PhaseStep::new("pre", "Pre-Deployment", PhaseStepType::PreDeployment))
        .post_deployment(PhaseStep::new("post", "Post-Deployment", PhaseStepType::PostDeployment))
        .phase(
            Phase::forward("p1", "Phase 1").with_phase_step(deploy_step("p1-deploy", &[])),
            Some(Phase::rollback_of("r1", "Rollback Phase 1", "Phase 1")),
        )
        .build()
        .unwrap()
}

/// Two staging phases used for on-demand rollback probing.
pub(crate) fn staging_topology() -> Topology {
    TopologyBuilder::new("staging", OrchestrationStyle::Canary)
        .phase(
            Phase::forward("s1", "Staging Execution Phase 1"),
            Some(Phase::rollback_of("sr1", "Rollback Staging 1", "Staging Execution Phase 1")),
        )
        .phase(
            Phase::forward("s2", "Staging Execution Phase 2"),
            Some(Phase::rollback_of("sr2", "Rollback Staging 2", "Staging Execution Phase 2")),
        )
        .build()
        .unwrap()
}

/// An advisor wired to in-memory collaborators, with handles to inspect them.
pub(crate) struct Harness {
    pub workflows: Arc<InMemoryWorkflows>,
    pub interrupts: Arc<InMemoryInterrupts>,
    pub instances: Arc<InMemoryInstanceSelector>,
    pub instance_sync: Arc<RecordingInstanceSync>,
    pub advisor: Advisor,
}

impl Harness {
    pub fn new(workflow_id: &str, topology: Topology) -> Self {
        Self::with_parts(
            workflow_id,
            topology,
            RecordingInstanceSync::new(),
            StaticExpressionEvaluator::new(),
        )
    }

    pub fn with_parts(
        workflow_id: &str,
        topology: Topology,
        instance_sync: RecordingInstanceSync,
        expressions: StaticExpressionEvaluator,
    ) -> Self {
        let workflows = Arc::new(InMemoryWorkflows::new());
        workflows.publish(workflow_id, topology).unwrap();
        let interrupts = Arc::new(InMemoryInterrupts::new());
        let instances = Arc::new(InMemoryInstanceSelector::new());
        let instance_sync = Arc::new(instance_sync);

        let advisor = Advisor::new(
            AdvisorConfig::default(),
            Collaborators {
                workflows: workflows.clone(),
                interrupt_query: interrupts.clone(),
                interrupt_queue: interrupts.clone(),
                instances: instances.clone(),
                instance_sync: instance_sync.clone(),
                expressions: Arc::new(expressions),
            },
        );

        Self {
            workflows,
            interrupts,
            instances,
            instance_sync,
            advisor,
        }
    }
}
