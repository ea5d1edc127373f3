//! Configuration module for the rollout advisor.
//!
//! Configuration is read from environment variables using the `envy` crate
//! for type-safe parsing.

mod advisor;

pub use advisor::AdvisorConfig;
