//! Failure policy resolution.
//!
//! Selection is "first wins" within a priority tier, never a score:
//! ROLLBACK_WORKFLOW beats ROLLBACK_PHASE beats everything else, and ties
//! are broken by declaration order.

use std::collections::BTreeSet;

use tracing::warn;

use crate::topology::{ExecutionScope, FailureCause, FailurePolicy, RepairAction};

/// Select the single policy that applies to a failure.
///
/// A policy matches when either side's cause set is empty or the sets
/// intersect, and when its step-name list is empty or names `step_name`.
pub fn resolve<'a>(
    policies: &'a [FailurePolicy],
    causes: &BTreeSet<FailureCause>,
    step_name: &str,
) -> Option<&'a FailurePolicy> {
    let matching: Vec<&FailurePolicy> = policies
        .iter()
        .filter(|p| causes_match(p, causes))
        .filter(|p| {
            p.applicable_step_names.is_empty()
                || p.applicable_step_names.iter().any(|n| n == step_name)
        })
        .collect();

    let selected = matching
        .iter()
        .find(|p| p.repair_action == RepairAction::RollbackWorkflow)
        .or_else(|| {
            matching
                .iter()
                .find(|p| p.repair_action == RepairAction::RollbackPhase)
        })
        .or_else(|| matching.first())
        .copied()?;

    if !selected.failure_causes.is_empty() && causes.is_empty() {
        warn!(
            step = %step_name,
            action = %selected.repair_action,
            "Failure causes unknown; accepting policy on a degraded match"
        );
    }

    Some(selected)
}

/// Like [`resolve`], but a selected policy scoped to phases is dropped when
/// the event was not raised inside a phase.
pub fn resolve_in_scope<'a>(
    policies: &'a [FailurePolicy],
    causes: &BTreeSet<FailureCause>,
    step_name: &str,
    in_phase: bool,
) -> Option<&'a FailurePolicy> {
    let selected = resolve(policies, causes, step_name)?;
    if selected.execution_scope == ExecutionScope::WorkflowPhase && !in_phase {
        return None;
    }
    Some(selected)
}

fn causes_match(policy: &FailurePolicy, causes: &BTreeSet<FailureCause>) -> bool {
    policy.failure_causes.is_empty()
        || causes.is_empty()
        || !policy.failure_causes.is_disjoint(causes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn causes(list: &[FailureCause]) -> BTreeSet<FailureCause> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_empty_policies() {
        assert!(resolve(&[], &causes(&[FailureCause::Connectivity]), "step").is_none());
    }

    #[test]
    fn test_cause_filter() {
        let policies = vec![
            FailurePolicy::new(RepairAction::Ignore).with_causes([FailureCause::Verification]),
            FailurePolicy::new(RepairAction::EndExecution)
                .with_causes([FailureCause::Connectivity]),
        ];
        let selected = resolve(&policies, &causes(&[FailureCause::Connectivity]), "step").unwrap();
        assert_eq!(selected.repair_action, RepairAction::EndExecution);

        assert!(resolve(&policies, &causes(&[FailureCause::Expired]), "step").is_none());
    }

    #[test]
    fn test_unknown_causes_match_everything() {
        let policies = vec![
            FailurePolicy::new(RepairAction::Ignore).with_causes([FailureCause::Verification]),
        ];
        let selected = resolve(&policies, &BTreeSet::new(), "step").unwrap();
        assert_eq!(selected.repair_action, RepairAction::Ignore);
    }

    #[test]
    fn test_step_name_filter() {
        let policies = vec![
            FailurePolicy::new(RepairAction::Ignore).for_steps(["Smoke Test"]),
            FailurePolicy::new(RepairAction::EndExecution),
        ];
        assert_eq!(
            resolve(&policies, &BTreeSet::new(), "Smoke Test").unwrap().repair_action,
            RepairAction::Ignore
        );
        assert_eq!(
            resolve(&policies, &BTreeSet::new(), "Install").unwrap().repair_action,
            RepairAction::EndExecution
        );
    }

    #[test]
    fn test_rollback_phase_beats_first_declared() {
        let policies = vec![
            FailurePolicy::new(RepairAction::Retry),
            FailurePolicy::new(RepairAction::RollbackPhase),
        ];
        assert_eq!(
            resolve(&policies, &BTreeSet::new(), "step").unwrap().repair_action,
            RepairAction::RollbackPhase
        );
    }

    #[test]
    fn test_first_declared_wins_on_ties() {
        let policies = vec![
            FailurePolicy::new(RepairAction::Ignore).with_causes([FailureCause::Connectivity]),
            FailurePolicy::new(RepairAction::EndExecution),
        ];
        let selected = resolve(&policies, &causes(&[FailureCause::Connectivity]), "step").unwrap();
        assert_eq!(selected.repair_action, RepairAction::Ignore);
    }

    #[test]
    fn test_phase_scoped_policy_outside_phase() {
        let policies = vec![
            FailurePolicy::new(RepairAction::RollbackWorkflow)
                .with_causes([FailureCause::ApplicationError])
                .with_scope(ExecutionScope::WorkflowPhase),
            FailurePolicy::new(RepairAction::Ignore),
        ];
        let app_error = causes(&[FailureCause::ApplicationError]);
        assert!(resolve_in_scope(&policies, &app_error, "step", false).is_none());
        assert_eq!(
            resolve_in_scope(&policies, &app_error, "step", true),
            Some(&policies[0])
        );
    }

    fn action_strategy() -> impl Strategy<Value = RepairAction> {
        prop_oneof![
            Just(RepairAction::Ignore),
            Just(RepairAction::EndExecution),
            Just(RepairAction::AbortAll),
            Just(RepairAction::PauseForManualAction),
            Just(RepairAction::RollbackPhase),
            Just(RepairAction::Retry),
        ]
    }

    proptest! {
        #[test]
        fn prop_rollback_workflow_always_wins(
            mut actions in prop::collection::vec(action_strategy(), 0..8),
            phase_at in any::<prop::sample::Index>(),
            workflow_at in any::<prop::sample::Index>(),
        ) {
            actions.insert(phase_at.index(actions.len() + 1), RepairAction::RollbackPhase);
            actions.insert(workflow_at.index(actions.len() + 1), RepairAction::RollbackWorkflow);
            let policies: Vec<FailurePolicy> =
                actions.iter().map(|a| FailurePolicy::new(*a)).collect();

            let selected = resolve(&policies, &BTreeSet::new(), "step").unwrap();
            prop_assert_eq!(selected.repair_action, RepairAction::RollbackWorkflow);
        }

        #[test]
        fn prop_without_rollbacks_first_wins(
            actions in prop::collection::vec(
                prop_oneof![
                    Just(RepairAction::Ignore),
                    Just(RepairAction::EndExecution),
                    Just(RepairAction::Retry),
                ],
                1..8,
            ),
        ) {
            let policies: Vec<FailurePolicy> =
                actions.iter().map(|a| FailurePolicy::new(*a)).collect();
            let selected = resolve(&policies, &BTreeSet::new(), "step").unwrap();
            prop_assert!(std::ptr::eq(selected, &policies[0]));
        }
    }
}
