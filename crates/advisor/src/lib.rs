//! Rollout Advisor Library
//!
//! This crate provides the advisory engine of a deployment workflow executor.
//! For every event a running deployment state machine emits, it decides what
//! the execution does next:
//!
//! - **Failure Policies**: Match failure causes to a repair action
//! - **Retries**: Back off according to the policy's interval schedule
//! - **Rollbacks**: Find the rollback phase for a forward phase, including
//!   the runtime-numbered phases of rolling deployments
//! - **Interrupts**: Honor pending abort-all and rollback interrupts
//!
//! ## Architecture
//!
//! The engine is a pure function of the workflow topology, the event, the
//! running instance's history and the pending interrupts. Topologies are
//! built once at publish time and shared read-only. Everything else the
//! engine needs comes through the collaborator traits in [`services`].
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`engine`]: Event evaluation and decisions
//! - [`error`]: Error types
//! - [`services`]: Collaborator traits and in-memory implementations
//! - [`topology`]: Workflow topology model, builder and parser
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rollout_advisor::{
//!     config::AdvisorConfig,
//!     engine::{Advisor, Collaborators},
//!     services::*,
//!     topology::parse_topology,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let workflows = Arc::new(InMemoryWorkflows::new());
//!     workflows.publish("wf-1", parse_topology(&std::fs::read_to_string("workflow.yaml")?)?)?;
//!     let interrupts = Arc::new(InMemoryInterrupts::new());
//!     let advisor = Advisor::new(
//!         AdvisorConfig::from_env()?,
//!         Collaborators {
//!             workflows,
//!             interrupt_query: interrupts.clone(),
//!             interrupt_queue: interrupts,
//!             instances: Arc::new(InMemoryInstanceSelector::new()),
//!             instance_sync: Arc::new(RecordingInstanceSync::new()),
//!             expressions: Arc::new(StaticExpressionEvaluator::new()),
//!         },
//!     );
//!     // advisor.evaluate(&event, &context)?
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod result_ext;
pub mod services;
pub mod topology;

pub use engine::{Advice, Advisor, AdvisoryDecision, NoAdviceReason};
pub use error::{AdvisorError, AdvisorResult};
pub use result_ext::{OptionExt, ResultExt};
