//! Retry scheduling.

use serde::{Deserialize, Serialize};

use crate::topology::FailurePolicy;

/// Whether another attempt is due.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RetryOutcome {
    Retry { wait_seconds: u64 },
    /// The caller re-dispatches with the policy's after-retries action.
    Exhausted,
}

/// Decide on the next retry given how many attempts already ran.
///
/// The wait is `retry_intervals_seconds[attempts]`, clamped to the last
/// entry, or 0 when no intervals are declared.
pub fn next_retry(policy: &FailurePolicy, attempts: usize) -> RetryOutcome {
    if attempts >= policy.retry_count as usize {
        return RetryOutcome::Exhausted;
    }
    let intervals = &policy.retry_intervals_seconds;
    let wait_seconds = match intervals.last() {
        None => 0,
        Some(last) => intervals.get(attempts).copied().unwrap_or(*last),
    };
    RetryOutcome::Retry { wait_seconds }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::RepairAction;
    use proptest::prelude::*;

    fn policy(count: u32, intervals: Vec<u64>) -> FailurePolicy {
        FailurePolicy::new(RepairAction::Retry).with_retry(
            count,
            intervals,
            RepairAction::EndExecution,
        )
    }

    #[test]
    fn test_interval_schedule_clamps_to_last() {
        let policy = policy(5, vec![30, 60, 120]);
        let waits: Vec<RetryOutcome> = (0..5).map(|n| next_retry(&policy, n)).collect();
        let expected: Vec<RetryOutcome> = [30, 60, 120, 120, 120]
            .into_iter()
            .map(|wait_seconds| RetryOutcome::Retry { wait_seconds })
            .collect();
        assert_eq!(waits, expected);
        assert_eq!(next_retry(&policy, 5), RetryOutcome::Exhausted);
    }

    #[test]
    fn test_no_intervals_waits_zero() {
        let policy = policy(2, vec![]);
        assert_eq!(next_retry(&policy, 1), RetryOutcome::Retry { wait_seconds: 0 });
    }

    #[test]
    fn test_zero_retry_count_is_exhausted() {
        assert_eq!(next_retry(&policy(0, vec![10]), 0), RetryOutcome::Exhausted);
    }

    proptest! {
        #[test]
        fn prop_wait_is_a_declared_interval(
            intervals in prop::collection::vec(0u64..3600, 1..6),
            attempts in 0usize..20,
        ) {
            let policy = policy(u32::MAX, intervals.clone());
            match next_retry(&policy, attempts) {
                RetryOutcome::Retry { wait_seconds } => {
                    let expected = intervals[attempts.min(intervals.len() - 1)];
                    prop_assert_eq!(wait_seconds, expected);
                }
                RetryOutcome::Exhausted => prop_assert!(false, "budget is unbounded"),
            }
        }

        #[test]
        fn prop_exhausted_once_budget_used(count in 0u32..10, extra in 0usize..10) {
            let policy = policy(count, vec![5]);
            prop_assert_eq!(next_retry(&policy, count as usize + extra), RetryOutcome::Exhausted);
        }
    }
}
