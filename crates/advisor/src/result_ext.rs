//! Logging helpers for results and lookups.
//!
//! `ResultExt::log_warn` records a swallowed side-effect failure and
//! `OptionExt::warn_missing` records a lookup that came back empty where the
//! topology should have had an answer. Both keep the value unchanged and add
//! the caller's source location to the log record.

use std::fmt::Display;
use tracing::warn;

/// Extension trait for logging errors with context.
pub trait ResultExt<T, E> {
    /// Log the error at warn level if this is an `Err` variant.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use rollout_advisor::result_ext::ResultExt;
    ///
    /// let result: Result<(), &str> = Err("agent offline");
    /// let _ = result.log_warn("instance sync");
    /// ```
    fn log_warn<S: ToString>(self, context: S) -> Result<T, E>;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn log_warn<S: ToString>(self, context: S) -> Result<T, E> {
        if let Err(ref e) = self {
            let caller_location = std::panic::Location::caller();
            warn!(
                target: "rollout_advisor",
                error = %e,
                file = %format!("{}:{}", caller_location.file(), caller_location.line()),
                context = %context.to_string(),
                "Operation failed"
            );
        }
        self
    }
}

/// Extension trait for logging empty lookups.
pub trait OptionExt<T> {
    /// Log at warn level if this is a `None` variant.
    fn warn_missing<S: ToString>(self, context: S) -> Option<T>;
}

impl<T> OptionExt<T> for Option<T> {
    #[track_caller]
    fn warn_missing<S: ToString>(self, context: S) -> Option<T> {
        if self.is_none() {
            let caller_location = std::panic::Location::caller();
            warn!(
                target: "rollout_advisor",
                file = %format!("{}:{}", caller_location.file(), caller_location.line()),
                context = %context.to_string(),
                "Topology lookup returned nothing"
            );
        }
        self
    }
}
