//! In-memory collaborators for embedding and testing.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No persistence, no distribution
//! - **Single-process only**: State is not visible across process boundaries

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::anyhow;

use super::{
    ExpressionEvaluator, InstanceSelector, InstanceSync, InterruptKind, InterruptQuery,
    InterruptQueue, InterruptRecord, SelectionRequest, WorkflowLookup,
};
use crate::engine::{ExecutionContext, ExecutionEvent};
use crate::topology::{PhaseStepType, Topology};

/// Converts a lock poison error to a collaborator error.
fn poison_err<T>(_: PoisonError<T>) -> anyhow::Error {
    anyhow!("in-memory collaborator lock poisoned")
}

/// Published topologies keyed by workflow id.
#[derive(Debug, Default)]
pub struct InMemoryWorkflows {
    workflows: RwLock<HashMap<String, Arc<Topology>>>,
}

impl InMemoryWorkflows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes (or replaces) a workflow.
    pub fn publish(&self, workflow_id: &str, topology: Topology) -> anyhow::Result<()> {
        let mut workflows = self.workflows.write().map_err(poison_err)?;
        workflows.insert(workflow_id.to_string(), Arc::new(topology));
        Ok(())
    }
}

impl WorkflowLookup for InMemoryWorkflows {
    fn get(&self, workflow_id: &str) -> anyhow::Result<Option<Arc<Topology>>> {
        let workflows = self.workflows.read().map_err(poison_err)?;
        Ok(workflows.get(workflow_id).cloned())
    }
}

/// Interrupt registry serving both the query and the queue side.
#[derive(Debug, Default)]
pub struct InMemoryInterrupts {
    records: RwLock<Vec<InterruptRecord>>,
}

impl InMemoryInterrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises an interrupt the way a user or another service would.
    pub fn raise(&self, execution_id: &str, kind: InterruptKind) -> anyhow::Result<()> {
        self.enqueue(InterruptRecord::new(execution_id, "", kind))
    }

    /// Outstanding records, oldest first.
    pub fn records(&self) -> anyhow::Result<Vec<InterruptRecord>> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.clone())
    }

    /// Consumes the pending interrupts of one kind for an execution.
    /// Returns how many were removed.
    pub fn acknowledge(&self, execution_id: &str, kind: InterruptKind) -> anyhow::Result<usize> {
        let mut records = self.records.write().map_err(poison_err)?;
        let before = records.len();
        records.retain(|r| !(r.execution_id == execution_id && r.kind == kind));
        Ok(before - records.len())
    }

    /// Drops every interrupt of a finished execution.
    pub fn clear(&self, execution_id: &str) -> anyhow::Result<()> {
        let mut records = self.records.write().map_err(poison_err)?;
        records.retain(|r| r.execution_id != execution_id);
        Ok(())
    }
}

impl InterruptQuery for InMemoryInterrupts {
    fn pending(&self, execution_id: &str) -> anyhow::Result<Vec<InterruptKind>> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records
            .iter()
            .filter(|r| r.execution_id == execution_id)
            .map(|r| r.kind)
            .collect())
    }
}

impl InterruptQueue for InMemoryInterrupts {
    fn enqueue(&self, record: InterruptRecord) -> anyhow::Result<()> {
        let mut records = self.records.write().map_err(poison_err)?;
        records.push(record);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Inventory {
    /// Hosts per infrastructure mapping, in selection order.
    hosts: HashMap<String, Vec<String>>,
    /// Infrastructure mappings resolved per execution.
    mappings: HashMap<String, Vec<String>>,
    /// Hosts already used per execution.
    excluded: HashMap<String, Vec<String>>,
}

/// Host inventory for rolling deployments.
#[derive(Debug, Default)]
pub struct InMemoryInstanceSelector {
    inventory: RwLock<Inventory>,
}

impl InMemoryInstanceSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_hosts(&self, infra_mapping_id: &str, hosts: &[&str]) -> anyhow::Result<()> {
        let mut inventory = self.inventory.write().map_err(poison_err)?;
        inventory
            .hosts
            .entry(infra_mapping_id.to_string())
            .or_default()
            .extend(hosts.iter().map(|h| h.to_string()));
        Ok(())
    }

    pub fn resolve_to(&self, execution_id: &str, infra_mapping_id: &str) -> anyhow::Result<()> {
        let mut inventory = self.inventory.write().map_err(poison_err)?;
        inventory
            .mappings
            .entry(execution_id.to_string())
            .or_default()
            .push(infra_mapping_id.to_string());
        Ok(())
    }

    /// Marks a host as already deployed for the execution.
    pub fn exclude(&self, execution_id: &str, host: &str) -> anyhow::Result<()> {
        let mut inventory = self.inventory.write().map_err(poison_err)?;
        inventory
            .excluded
            .entry(execution_id.to_string())
            .or_default()
            .push(host.to_string());
        Ok(())
    }
}

impl InstanceSelector for InMemoryInstanceSelector {
    fn excluded_instances(&self, context: &ExecutionContext) -> anyhow::Result<Vec<String>> {
        let inventory = self.inventory.read().map_err(poison_err)?;
        Ok(inventory
            .excluded
            .get(&context.execution_id)
            .cloned()
            .unwrap_or_default())
    }

    fn resolve_infra_mappings(&self, context: &ExecutionContext) -> anyhow::Result<Vec<String>> {
        let inventory = self.inventory.read().map_err(poison_err)?;
        Ok(inventory
            .mappings
            .get(&context.execution_id)
            .cloned()
            .unwrap_or_default())
    }

    fn select_instances(&self, request: &SelectionRequest) -> anyhow::Result<Vec<String>> {
        let inventory = self.inventory.read().map_err(poison_err)?;
        let Some(hosts) = inventory.hosts.get(&request.infra_mapping_id) else {
            return Ok(Vec::new());
        };
        Ok(hosts
            .iter()
            .filter(|h| !request.excluded.contains(h))
            .take(request.count)
            .cloned()
            .collect())
    }
}

/// Instance sync that records every call and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingInstanceSync {
    calls: RwLock<Vec<(PhaseStepType, String)>>,
    fail: bool,
}

impl RecordingInstanceSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: RwLock::new(Vec::new()),
            fail: true,
        }
    }

    /// `(phase-step type, step id)` per call, oldest first.
    pub fn calls(&self) -> anyhow::Result<Vec<(PhaseStepType, String)>> {
        let calls = self.calls.read().map_err(poison_err)?;
        Ok(calls.clone())
    }
}

impl InstanceSync for RecordingInstanceSync {
    fn extract(
        &self,
        phase_step_type: PhaseStepType,
        event: &ExecutionEvent,
        _context: &ExecutionContext,
    ) -> anyhow::Result<()> {
        let mut calls = self.calls.write().map_err(poison_err)?;
        calls.push((phase_step_type, event.step_id.clone()));
        if self.fail {
            return Err(anyhow!("instance store unavailable"));
        }
        Ok(())
    }
}

/// Evaluator answering from a fixed table of expressions.
#[derive(Debug, Default)]
pub struct StaticExpressionEvaluator {
    answers: HashMap<String, Result<bool, String>>,
}

impl StaticExpressionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, expression: &str, answer: bool) -> Self {
        self.answers.insert(expression.to_string(), Ok(answer));
        self
    }

    pub fn with_error(mut self, expression: &str, message: &str) -> Self {
        self.answers
            .insert(expression.to_string(), Err(message.to_string()));
        self
    }
}

impl ExpressionEvaluator for StaticExpressionEvaluator {
    fn evaluate(&self, expression: &str, _context: &ExecutionContext) -> anyhow::Result<bool> {
        match self.answers.get(expression) {
            Some(Ok(answer)) => Ok(*answer),
            Some(Err(message)) => Err(anyhow!("{}", message)),
            None => Err(anyhow!("Unknown expression: {}", expression)),
        }
    }
}
