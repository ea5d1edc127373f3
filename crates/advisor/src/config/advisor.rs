//! Advisor configuration.

use serde::Deserialize;

use crate::error::AdvisorResult;
use crate::topology::TimeoutAction;

/// Advisor configuration loaded from environment variables.
///
/// Environment variables are prefixed with `ADVISOR_`:
/// - `ADVISOR_STAGING_PHASE_PREFIX`: Name prefix of on-demand rollback staging phases
/// - `ADVISOR_ROLLBACK_PROVISIONERS_STEP`: Name of the provisioner rollback phase-step
/// - `ADVISOR_PROVISIONER_STEP_TYPES`: Comma-separated step types that provision infrastructure
/// - `ADVISOR_MANUAL_INTERVENTION_TIMEOUT_MS`: Default pause timeout
/// - `ADVISOR_ACTION_AFTER_MANUAL_TIMEOUT`: Default action once a pause times out
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorConfig {
    /// Phases whose name starts with this prefix probe on-demand rollback.
    #[serde(default = "default_staging_phase_prefix")]
    pub staging_phase_prefix: String,

    /// Target name for provisioner rollback.
    #[serde(default = "default_rollback_provisioners_step")]
    pub rollback_provisioners_step: String,

    /// Step types whose presence in pre-deployment steps means infrastructure
    /// was provisioned and has to be rolled back on failure.
    #[serde(default = "default_provisioner_step_types")]
    pub provisioner_step_types: Vec<String>,

    /// Pause timeout used when a policy does not declare one.
    #[serde(default = "default_manual_intervention_timeout_ms")]
    pub manual_intervention_timeout_ms: u64,

    /// Action after a pause times out, when a policy does not declare one.
    #[serde(default = "default_action_after_manual_timeout")]
    pub action_after_manual_timeout: TimeoutAction,
}

fn default_staging_phase_prefix() -> String {
    "Staging Execution Phase".to_string()
}

fn default_rollback_provisioners_step() -> String {
    "Rollback Provisioners".to_string()
}

fn default_provisioner_step_types() -> Vec<String> {
    vec![
        "CLOUD_FORMATION_CREATE_STACK".to_string(),
        "TERRAFORM_PROVISION".to_string(),
    ]
}

fn default_manual_intervention_timeout_ms() -> u64 {
    // 14 days
    1_209_600_000
}

fn default_action_after_manual_timeout() -> TimeoutAction {
    TimeoutAction::EndExecution
}

impl AdvisorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `ADVISOR_`.
    pub fn from_env() -> AdvisorResult<Self> {
        Ok(envy::prefixed("ADVISOR_").from_env::<AdvisorConfig>()?)
    }

    /// Whether a step type provisions infrastructure.
    pub fn is_provisioner_step(&self, step_type: &str) -> bool {
        self.provisioner_step_types.iter().any(|t| t == step_type)
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            staging_phase_prefix: default_staging_phase_prefix(),
            rollback_provisioners_step: default_rollback_provisioners_step(),
            provisioner_step_types: default_provisioner_step_types(),
            manual_intervention_timeout_ms: default_manual_intervention_timeout_ms(),
            action_after_manual_timeout: default_action_after_manual_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdvisorConfig::default();
        assert_eq!(config.rollback_provisioners_step, "Rollback Provisioners");
        assert_eq!(config.manual_intervention_timeout_ms, 1_209_600_000);
        assert_eq!(config.action_after_manual_timeout, TimeoutAction::EndExecution);
    }

    #[test]
    fn test_provisioner_step_types() {
        let config = AdvisorConfig::default();
        assert!(config.is_provisioner_step("TERRAFORM_PROVISION"));
        assert!(config.is_provisioner_step("CLOUD_FORMATION_CREATE_STACK"));
        assert!(!config.is_provisioner_step("SHELL_SCRIPT"));
    }

    #[test]
    fn test_from_iter_overrides() {
        let vars = vec![
            ("ADVISOR_STAGING_PHASE_PREFIX".to_string(), "Canary Probe".to_string()),
            (
                "ADVISOR_PROVISIONER_STEP_TYPES".to_string(),
                "TERRAFORM_PROVISION,PULUMI_UP".to_string(),
            ),
            (
                "ADVISOR_ACTION_AFTER_MANUAL_TIMEOUT".to_string(),
                "ROLLBACK_WORKFLOW".to_string(),
            ),
        ];
        let config: AdvisorConfig = envy::prefixed("ADVISOR_").from_iter(vars).unwrap();
        assert_eq!(config.staging_phase_prefix, "Canary Probe");
        assert!(config.is_provisioner_step("PULUMI_UP"));
        assert!(!config.is_provisioner_step("CLOUD_FORMATION_CREATE_STACK"));
        assert_eq!(config.action_after_manual_timeout, TimeoutAction::RollbackWorkflow);
        assert_eq!(config.rollback_provisioners_step, "Rollback Provisioners");
    }
}
