//! Workflow topology model.
//!
//! - **Types**: phases, phase-steps, failure policies and skip strategies
//! - **Model**: the immutable [`Topology`] arena with read-only lookups
//! - **Builder**: publish-time construction and invariant checks
//! - **Parser**: YAML workflow documents

pub mod builder;
pub mod model;
pub mod parser;
pub mod types;

pub use builder::TopologyBuilder;
pub use model::Topology;
pub use parser::{parse_topology, WorkflowDocument};
pub use types::{
    ExecutionScope, FailureCause, FailurePolicy, GraphNode, OrchestrationStyle, Phase,
    PhaseStep, PhaseStepType, RepairAction, SkipScope, StepDef, StepSkipStrategy,
    TimeoutAction,
};
