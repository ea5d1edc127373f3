//! Advisory engine.
//!
//! Evaluates one execution event at a time:
//! - Checks pending interrupts and loads the workflow topology
//! - Handles rolling phase generation and provisioner rollback
//! - Resolves a failure policy and dispatches on its repair action
//!
//! Evaluation has no side effects of its own except enqueueing an
//! abort-all interrupt. Instance extraction after phase-steps runs
//! separately through [`Advisor::run_post_decision_hooks`].

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::AdvisorConfig;
use crate::error::{AdvisorError, AdvisorResult};
use crate::result_ext::{OptionExt, ResultExt};
use crate::services::{
    ExpressionEvaluator, InstanceSelector, InstanceSync, InterruptKind, InterruptQuery,
    InterruptQueue, InterruptRecord, SelectionRequest, WorkflowLookup,
};
use crate::topology::{FailurePolicy, PhaseStepType, RepairAction, Topology};

use super::decision::{Advice, AdvisoryDecision, NoAdviceReason};
use super::event::{
    ExecutionContext, ExecutionEvent, ExecutionKind, ExecutionStatus, PhaseRef, StepKind,
};
use super::resolver::resolve_in_scope;
use super::retry::{next_retry, RetryOutcome};
use super::rollback::RollbackPlanner;
use super::rolling::{next_rolling_label, RollingLabel};
use super::skip;

/// Collaborators injected into an [`Advisor`].
#[derive(Clone)]
pub struct Collaborators {
    pub workflows: Arc<dyn WorkflowLookup>,
    pub interrupt_query: Arc<dyn InterruptQuery>,
    pub interrupt_queue: Arc<dyn InterruptQueue>,
    pub instances: Arc<dyn InstanceSelector>,
    pub instance_sync: Arc<dyn InstanceSync>,
    pub expressions: Arc<dyn ExpressionEvaluator>,
}

/// The advisory engine. Cheap to share across executor workers.
pub struct Advisor {
    config: AdvisorConfig,
    services: Collaborators,
}

impl Advisor {
    pub fn new(config: AdvisorConfig, services: Collaborators) -> Self {
        Self { config, services }
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Evaluate an execution event and decide what the executor does next.
    ///
    /// Returns `NoAdvice` when the executor should fall through to its
    /// default behavior. Errors are reserved for collaborator failures,
    /// unknown repair actions and corrupt state.
    pub fn evaluate(
        &self,
        event: &ExecutionEvent,
        context: &ExecutionContext,
    ) -> AdvisorResult<Advice> {
        let pending = self.services.interrupt_query.pending(&context.execution_id)?;
        if pending.contains(&InterruptKind::AbortAll) {
            info!(
                execution_id = %context.execution_id,
                step = %event.step_name,
                "Abort-all interrupt pending, ending execution"
            );
            return Ok(AdvisoryDecision::EndExecution.into());
        }

        let Some(topology) = self.services.workflows.get(&context.workflow_id)? else {
            warn!(
                execution_id = %context.execution_id,
                workflow_id = %context.workflow_id,
                "Workflow not found"
            );
            return Ok(Advice::none(NoAdviceReason::WorkflowNotFound));
        };

        let advice = self.advise(&topology, &pending, event, context)?;
        match &advice {
            Advice::Decision { decision } => info!(
                execution_id = %context.execution_id,
                step = %event.step_name,
                decision = decision.label(),
                "Advice issued"
            ),
            Advice::NoAdvice { reason } => debug!(
                execution_id = %context.execution_id,
                step = %event.step_name,
                reason = ?reason,
                "No advice"
            ),
        }
        Ok(advice)
    }

    /// Skip check run before a step starts.
    pub fn skip_advice(
        &self,
        event: &ExecutionEvent,
        context: &ExecutionContext,
    ) -> AdvisorResult<Advice> {
        let Some(topology) = self.services.workflows.get(&context.workflow_id)? else {
            return Ok(Advice::none(NoAdviceReason::WorkflowNotFound));
        };
        let phase_id = context.phase.as_ref().map(|p| p.id.as_str());
        let Some(phase_step) = event
            .parent_id
            .as_deref()
            .and_then(|parent| topology.find_phase_step(parent, phase_id))
        else {
            return Ok(Advice::not_applicable());
        };
        Ok(skip::skip_advice(
            phase_step,
            &event.step_id,
            self.services.expressions.as_ref(),
            context,
        ))
    }

    /// Post-decision hook for phase-step events: extract deployed instances.
    ///
    /// Fire-and-forget. Failures are logged and never reach the caller, so
    /// the executor may call this regardless of the advice it received.
    pub fn run_post_decision_hooks(&self, event: &ExecutionEvent, context: &ExecutionContext) {
        let Some(phase_step_type) = event.kind.phase_step_type() else {
            return;
        };
        let _ = self
            .services
            .instance_sync
            .extract(phase_step_type, event, context)
            .log_warn(format!(
                "instance sync for execution {}",
                context.execution_id
            ));
    }

    fn advise(
        &self,
        topology: &Topology,
        pending: &[InterruptKind],
        event: &ExecutionEvent,
        context: &ExecutionContext,
    ) -> AdvisorResult<Advice> {
        let rolling = topology.orchestration_style().is_rolling() && !context.v2_rolling;
        let planner = RollbackPlanner::new(topology, &self.config);

        if rolling
            && event.status == ExecutionStatus::Success
            && event.kind.phase_step_type() == Some(PhaseStepType::PreDeployment)
        {
            return Ok(self.start_rolling(topology, context));
        }

        let mut provisioners_rolled_back = false;
        match &event.kind {
            StepKind::Phase(phase) => {
                if !phase.rollback && event.status == ExecutionStatus::Success {
                    return self.forward_phase_succeeded(
                        topology, &planner, rolling, event, phase, context,
                    );
                }
                if !phase.rollback && !event.status.is_negative() {
                    return Ok(Advice::not_applicable());
                }
                // Failed rollback phases surface to the executor directly.
                if phase.rollback && event.status != ExecutionStatus::Success {
                    return Ok(Advice::not_applicable());
                }
            }
            StepKind::PhaseStep {
                phase_step_type: PhaseStepType::RollbackProvisioners,
            } if event.status == ExecutionStatus::Success => {
                provisioners_rolled_back = true;
            }
            StepKind::PhaseStep {
                phase_step_type: PhaseStepType::PreDeployment,
            } if event.status == ExecutionStatus::Failed => {
                return Ok(planner
                    .provisioner_rollback()
                    .map(Advice::from)
                    .unwrap_or_else(Advice::not_applicable));
            }
            _ if !event.status.is_failure() => return Ok(Advice::not_applicable()),
            _ => {}
        }

        let rollback_pending = pending.contains(&InterruptKind::Rollback);
        let phase = event.kind.as_phase();

        // Rollback can only start at phase granularity.
        if phase.is_none() && rollback_pending {
            return Ok(AdvisoryDecision::EndExecution.into());
        }

        if context.execution_kind != ExecutionKind::Orchestration {
            return Ok(Advice::not_applicable());
        }

        if let Some(phase) = phase.filter(|_| rollback_pending) {
            return planner.phase_rollback_advice(
                &event.step_id,
                phase,
                &context.instance,
                context.v2_rolling,
            );
        }

        if provisioners_rolled_back {
            return Ok(planner.rollback_after_provisioners(&context.instance));
        }

        if context.instance.has_already_continued {
            return Ok(Advice::none(NoAdviceReason::AlreadyContinued));
        }

        let Some(policy) = self.select_policy(topology, event, context) else {
            return Ok(Advice::not_applicable());
        };
        self.dispatch(&planner, topology, policy, event, context)
    }

    /// Step-level policies first, then the workflow-wide ones.
    fn select_policy<'t>(
        &self,
        topology: &'t Topology,
        event: &ExecutionEvent,
        context: &ExecutionContext,
    ) -> Option<&'t FailurePolicy> {
        let in_phase = context.phase.is_some() || event.is_phase();
        let phase_id = context.phase.as_ref().map(|p| p.id.as_str());

        let step_policy = event
            .parent_id
            .as_deref()
            .and_then(|parent| topology.find_phase_step(parent, phase_id))
            .and_then(|phase_step| {
                resolve_in_scope(
                    &phase_step.failure_policies,
                    &event.failure_causes,
                    &event.step_name,
                    in_phase,
                )
            });

        step_policy.or_else(|| {
            resolve_in_scope(
                topology.failure_policies(),
                &event.failure_causes,
                &event.step_name,
                in_phase,
            )
        })
    }

    fn dispatch(
        &self,
        planner: &RollbackPlanner<'_>,
        topology: &Topology,
        policy: &FailurePolicy,
        event: &ExecutionEvent,
        context: &ExecutionContext,
    ) -> AdvisorResult<Advice> {
        debug!(
            execution_id = %context.execution_id,
            step = %event.step_name,
            action = %policy.repair_action,
            "Dispatching failure policy"
        );

        match policy.repair_action {
            RepairAction::Ignore => Ok(AdvisoryDecision::Ignore.into()),
            RepairAction::EndExecution => Ok(AdvisoryDecision::EndExecution.into()),
            RepairAction::AbortAll => {
                let record = InterruptRecord::new(
                    &context.execution_id,
                    &context.app_id,
                    InterruptKind::AbortAll,
                );
                let _ = self
                    .services
                    .interrupt_queue
                    .enqueue(record)
                    .log_warn("enqueue abort-all interrupt");
                Ok(AdvisoryDecision::EndExecution.into())
            }
            RepairAction::PauseForManualAction => {
                if event.kind.is_composite() {
                    return Ok(Advice::not_applicable());
                }
                Ok(self.pause(topology, policy, event, context).into())
            }
            RepairAction::RollbackPhase => Ok(match event.kind.as_phase() {
                Some(phase) => planner.rollback_phase(&event.step_id, phase),
                None => Advice::not_applicable(),
            }),
            RepairAction::RollbackWorkflow => match event.kind.as_phase() {
                Some(phase) => planner.phase_rollback_advice(
                    &event.step_id,
                    phase,
                    &context.instance,
                    context.v2_rolling,
                ),
                None => Ok(Advice::not_applicable()),
            },
            RepairAction::Retry => {
                // Retry is only legal at leaf steps.
                if !event.kind.is_composite() {
                    let outcome = next_retry(policy, context.attempts());
                    if let RetryOutcome::Retry { wait_seconds } = outcome {
                        return Ok(AdvisoryDecision::Retry { wait_seconds }.into());
                    }
                }
                match policy.after_retries() {
                    Some(next) => self.dispatch(planner, topology, &next, event, context),
                    None => Ok(Advice::not_applicable()),
                }
            }
            RepairAction::Unrecognized => Err(AdvisorError::UnexpectedRepairAction(
                policy.repair_action.to_string(),
            )),
        }
    }

    fn pause(
        &self,
        topology: &Topology,
        policy: &FailurePolicy,
        event: &ExecutionEvent,
        context: &ExecutionContext,
    ) -> AdvisoryDecision {
        AdvisoryDecision::Pause {
            params: snapshot_params(topology, event, context),
            timeout_ms: policy
                .manual_intervention_timeout_ms
                .unwrap_or(self.config.manual_intervention_timeout_ms),
            action_after_timeout: policy
                .action_after_timeout
                .unwrap_or(self.config.action_after_manual_timeout),
            notify_groups: topology.notify_groups().to_vec(),
        }
    }

    fn start_rolling(&self, topology: &Topology, context: &ExecutionContext) -> Advice {
        let Some(first) = topology
            .first_phase()
            .warn_missing("rolling workflow has no phases")
        else {
            return Advice::unresolvable();
        };
        AdvisoryDecision::Continue {
            next_step: first.name.clone(),
            display_name: Some(RollingLabel::Forward(1).to_string()),
            child_state_machine_id: context.instance.child_state_machine_id.clone(),
        }
        .into()
    }

    fn forward_phase_succeeded(
        &self,
        topology: &Topology,
        planner: &RollbackPlanner<'_>,
        rolling: bool,
        event: &ExecutionEvent,
        phase: &PhaseRef,
        context: &ExecutionContext,
    ) -> AdvisorResult<Advice> {
        if event.step_name.starts_with(&self.config.staging_phase_prefix) {
            return Ok(planner.staging_advice(&event.step_id, &event.step_name, phase));
        }
        if !rolling {
            return Ok(Advice::not_applicable());
        }
        if !context.execution_hosts.is_empty() {
            info!(
                execution_id = %context.execution_id,
                "Not generating rolling phases when execution hosts are present"
            );
            return Ok(Advice::not_applicable());
        }

        let mut excluded = self.services.instances.excluded_instances(context)?;
        let mut seen = HashSet::new();
        excluded.retain(|host| seen.insert(host.clone()));

        let infra_mapping_id = match &context.infra_mapping_id {
            Some(id) => id.clone(),
            None => {
                let resolved = self.services.instances.resolve_infra_mappings(context)?;
                match resolved.into_iter().next() {
                    Some(id) => id,
                    None => return Ok(self.continue_to_post_deployment(topology, context)),
                }
            }
        };

        let selected = self.services.instances.select_instances(&SelectionRequest {
            app_id: context.app_id.clone(),
            execution_id: context.execution_id.clone(),
            infra_mapping_id,
            excluded,
            count: 1,
        })?;
        if selected.is_empty() {
            return Ok(self.continue_to_post_deployment(topology, context));
        }

        Ok(AdvisoryDecision::Continue {
            next_step: context.instance.state_name.clone(),
            display_name: Some(next_rolling_label(&context.instance.executed_phases).to_string()),
            child_state_machine_id: context.instance.child_state_machine_id.clone(),
        }
        .into())
    }

    fn continue_to_post_deployment(
        &self,
        topology: &Topology,
        context: &ExecutionContext,
    ) -> Advice {
        AdvisoryDecision::Continue {
            next_step: topology.post_deployment().name.clone(),
            display_name: None,
            child_state_machine_id: context.instance.child_state_machine_id.clone(),
        }
        .into()
    }
}

/// Step properties captured into a pause, from the step's graph node plus
/// its template binding and the account id.
fn snapshot_params(
    topology: &Topology,
    event: &ExecutionEvent,
    context: &ExecutionContext,
) -> Option<serde_json::Map<String, Value>> {
    let parent_id = event.parent_id.as_deref()?;
    let node = topology.graph_node(parent_id, &event.step_id)?;
    let mut properties = node.properties.clone();

    if let Some(template) = &event.template {
        if !template.variables.is_empty() {
            properties.insert(
                "templateVariables".to_string(),
                Value::Object(template.variables.clone()),
            );
        }
        if let Some(uuid) = template.uuid.as_deref().filter(|s| !s.is_empty()) {
            properties.insert("templateUuid".to_string(), Value::from(uuid));
        }
        if let Some(version) = template.version.as_deref().filter(|s| !s.is_empty()) {
            properties.insert("templateVersion".to_string(), Value::from(version));
        }
    }
    if !context.account_id.is_empty() {
        properties.insert("accountId".to_string(), Value::from(context.account_id.as_str()));
    }
    Some(properties)
}
