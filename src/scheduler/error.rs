//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Every candidate fetch in the cycle failed
    NoSuccessfulFetches {
        attempted: usize,
    },

    /// Fetches succeeded but none produced a rankable outcome
    NoEligibleOutcome {
        successes: usize,
    },

    /// Refresh configuration error
    ConfigError {
        field: String,
        reason: String,
    },

    /// Unknown timezone name
    InvalidTimezone {
        tz: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuccessfulFetches { attempted } => {
                write!(
                    f,
                    "Refresh cycle produced no successful fetches ({} attempted)",
                    attempted
                )
            }
            Self::NoEligibleOutcome { successes } => {
                write!(
                    f,
                    "None of {} fetched outcomes could be ranked",
                    successes
                )
            }
            Self::ConfigError { field, reason } => {
                write!(f, "Refresh config error in '{}': {}", field, reason)
            }
            Self::InvalidTimezone { tz } => {
                write!(f, "Invalid timezone: {}", tz)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create a config error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid timezone error
    pub fn invalid_timezone(tz: impl Into<String>) -> Self {
        Self::InvalidTimezone { tz: tz.into() }
    }

    /// Whether the next scheduled cycle may succeed without intervention
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoSuccessfulFetches { .. } | Self::NoEligibleOutcome { .. }
        )
    }

    /// Short label used for metrics and events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoSuccessfulFetches { .. } => "no_successes",
            Self::NoEligibleOutcome { .. } => "no_eligible",
            Self::ConfigError { .. } => "config",
            Self::InvalidTimezone { .. } => "timezone",
        }
    }
}
