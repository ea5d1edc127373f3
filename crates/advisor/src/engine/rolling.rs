//! Rolling deployment phase numbering.
//!
//! Rolling executions generate their phases at runtime and number them
//! through the instance display name ("Rolling Phase 3"). Rollback phases
//! are numbered the same way ("Rollback Phase 2"). Labels are parsed into
//! [`RollingLabel`] instead of being sliced by prefix length.

use std::fmt;

pub const ROLLING_PHASE_PREFIX: &str = "Rolling Phase ";
pub const ROLLBACK_PHASE_PREFIX: &str = "Rollback Phase ";

/// Parsed display name of a rolling phase instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollingLabel {
    Forward(u32),
    Rollback(u32),
}

impl RollingLabel {
    pub fn parse(display_name: &str) -> Option<Self> {
        if let Some(rest) = display_name.strip_prefix(ROLLING_PHASE_PREFIX) {
            return rest.trim().parse().ok().map(RollingLabel::Forward);
        }
        if let Some(rest) = display_name.strip_prefix(ROLLBACK_PHASE_PREFIX) {
            return rest.trim().parse().ok().map(RollingLabel::Rollback);
        }
        None
    }

    pub fn index(self) -> u32 {
        match self {
            RollingLabel::Forward(n) | RollingLabel::Rollback(n) => n,
        }
    }

    /// Index of the rollback phase to run after this one, or `None` once
    /// every rolling batch has been rolled back.
    ///
    /// Both directions step down by one: a failure in "Rolling Phase 3"
    /// continues with "Rollback Phase 2", and "Rollback Phase 2" finishing
    /// continues with "Rollback Phase 1".
    pub fn next_rollback_index(self) -> Option<u32> {
        match self.index().checked_sub(1) {
            Some(n) if n >= 1 => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for RollingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollingLabel::Forward(n) => write!(f, "{}{}", ROLLING_PHASE_PREFIX, n),
            RollingLabel::Rollback(n) => write!(f, "{}{}", ROLLBACK_PHASE_PREFIX, n),
        }
    }
}

/// Display name of the next forward rolling phase: one past the number of
/// rolling phases already executed.
pub fn next_rolling_label<S: AsRef<str>>(executed_phases: &[S]) -> RollingLabel {
    let count = executed_phases
        .iter()
        .filter(|name| name.as_ref().starts_with(ROLLING_PHASE_PREFIX))
        .count();
    RollingLabel::Forward(count as u32 + 1)
}
