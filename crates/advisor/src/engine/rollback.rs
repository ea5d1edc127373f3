//! Rollback planning.
//!
//! Works out which phase runs next once a rollback is required. Rolling
//! workflows reuse one rollback phase template and number it at runtime;
//! every other style walks the forward-to-rollback mapping backwards.

use tracing::{debug, warn};

use crate::config::AdvisorConfig;
use crate::error::{AdvisorError, AdvisorResult};
use crate::result_ext::OptionExt;
use crate::topology::Topology;

use super::decision::{Advice, AdvisoryDecision};
use super::event::{PhaseRef, StepInstance};
use super::rolling::RollingLabel;

/// Computes rollback targets against one topology.
pub struct RollbackPlanner<'a> {
    topology: &'a Topology,
    config: &'a AdvisorConfig,
}

impl<'a> RollbackPlanner<'a> {
    pub fn new(topology: &'a Topology, config: &'a AdvisorConfig) -> Self {
        Self { topology, config }
    }

    /// Next rollback step for a phase that failed (or a rollback phase that
    /// finished), branching on the orchestration style.
    pub fn phase_rollback_advice(
        &self,
        phase_id: &str,
        phase: &PhaseRef,
        instance: &StepInstance,
        v2_rolling: bool,
    ) -> AdvisorResult<Advice> {
        if self.topology.orchestration_style().is_rolling() && !v2_rolling {
            self.rolling_advice(phase, instance)
        } else {
            Ok(self.standard_advice(phase_id, phase))
        }
    }

    fn rolling_advice(&self, phase: &PhaseRef, instance: &StepInstance) -> AdvisorResult<Advice> {
        let label = RollingLabel::parse(&instance.display_name).ok_or_else(|| {
            AdvisorError::CorruptState(format!(
                "Rolling instance has no phase number: '{}'",
                instance.display_name
            ))
        })?;
        if matches!(label, RollingLabel::Rollback(_)) != phase.rollback {
            return Err(AdvisorError::CorruptState(format!(
                "Display name '{}' does not match the phase direction",
                instance.display_name
            )));
        }

        let Some(index) = label.next_rollback_index() else {
            debug!(label = %label, "All rolling phases rolled back");
            return Ok(AdvisoryDecision::RollbackComplete.into());
        };

        let Some(template) = self
            .topology
            .shared_rollback_phase()
            .warn_missing("rolling workflow has no rollback phase")
        else {
            return Ok(Advice::unresolvable());
        };

        Ok(AdvisoryDecision::Rollback {
            target: template.name.clone(),
            display_name: Some(RollingLabel::Rollback(index).to_string()),
            rolling_phase_name: Some(RollingLabel::Forward(index).to_string()),
        }
        .into())
    }

    fn standard_advice(&self, phase_id: &str, phase: &PhaseRef) -> Advice {
        if !phase.rollback {
            if let Some(decision) = self.provisioner_rollback() {
                return decision.into();
            }
            return self.mapped_rollback(phase_id);
        }

        let Some(forward_name) = phase.rollback_of_phase_name.as_deref() else {
            warn!(phase = %phase_id, "Rollback phase does not name the phase it undoes");
            return Advice::unresolvable();
        };
        let Some((position, _)) = self
            .topology
            .forward_phase_by_name(forward_name)
            .warn_missing(format!("forward phase '{}'", forward_name))
        else {
            return Advice::unresolvable();
        };
        if position == 0 {
            return AdvisoryDecision::RollbackComplete.into();
        }
        let previous = &self.topology.phases()[position - 1];
        self.mapped_rollback(&previous.id)
    }

    /// Roll back a single phase (ROLLBACK_PHASE).
    pub fn rollback_phase(&self, phase_id: &str, phase: &PhaseRef) -> Advice {
        if phase.rollback {
            return AdvisoryDecision::RollbackComplete.into();
        }
        self.mapped_rollback(phase_id)
    }

    /// On-demand rollback probing: only the last staging phase rolls back.
    pub fn staging_advice(&self, phase_id: &str, phase_name: &str, phase: &PhaseRef) -> Advice {
        if self.topology.is_last_phase(phase_name) {
            return self.standard_advice(phase_id, phase);
        }
        Advice::not_applicable()
    }

    /// Rollback to the provisioner rollback step, when pre-deployment
    /// provisioned infrastructure.
    pub fn provisioner_rollback(&self) -> Option<AdvisoryDecision> {
        let provisioned = self
            .topology
            .pre_deployment()
            .contains_step_type(|t| self.config.is_provisioner_step(t));
        provisioned.then(|| AdvisoryDecision::rollback_to(&self.config.rollback_provisioners_step))
    }

    /// Once provisioners are rolled back, continue with the rollback of the
    /// last phase executed without gaps from the start of the workflow.
    pub fn rollback_after_provisioners(&self, instance: &StepInstance) -> Advice {
        let last_executed = self
            .topology
            .phases()
            .iter()
            .take_while(|p| instance.has_executed(&p.name))
            .last();
        match last_executed {
            None => AdvisoryDecision::RollbackComplete.into(),
            Some(phase) => self.mapped_rollback(&phase.id),
        }
    }

    fn mapped_rollback(&self, forward_phase_id: &str) -> Advice {
        match self
            .topology
            .rollback_phase_for(forward_phase_id)
            .warn_missing(format!("rollback phase for '{}'", forward_phase_id))
        {
            Some(rollback) => AdvisoryDecision::rollback_to(&rollback.name).into(),
            None => Advice::unresolvable(),
        }
    }
}
