//! Advisory engine.
//!
//! This module provides the decision logic for execution events:
//!
//! - **Advisor**: Evaluates events against topology and interrupts
//! - **Resolver**: Selects the failure policy for a failure
//! - **Retry**: Computes retry backoff from attempt history
//! - **Rollback**: Plans rollback targets, including rolling numbering
//! - **Skip**: Evaluates step skip assertions

pub mod advisor;
pub mod decision;
pub mod event;
pub mod resolver;
pub mod retry;
pub mod rollback;
pub mod rolling;
pub mod skip;

#[cfg(test)]
pub(crate) mod fixtures;

pub use advisor::{Advisor, Collaborators};
pub use decision::{Advice, AdvisoryDecision, NoAdviceReason};
pub use event::{
    AttemptRecord, ExecutionContext, ExecutionEvent, ExecutionKind, ExecutionStatus, PhaseContext,
    PhaseRef, StepInstance, StepKind, StepTemplate,
};
pub use resolver::{resolve, resolve_in_scope};
pub use retry::{next_retry, RetryOutcome};
pub use rollback::RollbackPlanner;
pub use rolling::RollingLabel;
