//! Unified error handling for the hindsight crate
//!
//! Each module keeps its own error type ([`FetchError`], [`BackupError`],
//! [`SchedulerError`], [`ConfigError`]); [`Error`] wraps them so callers
//! that cross module boundaries can use one type and still classify
//! failures through [`ErrorCategory`].
//!
//! # Usage
//!
//! ```rust
//! use hindsight::error::{Error, ErrorCategory};
//! use hindsight::scheduler::SchedulerError;
//!
//! let err: Error = SchedulerError::NoSuccessfulFetches { attempted: 25 }.into();
//! assert_eq!(err.category(), ErrorCategory::Scheduler);
//! assert!(err.is_recoverable());
//! ```

use std::io;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::fetcher::FetchError;
pub use crate::scheduler::SchedulerError;
pub use crate::storage::BackupError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Data source and HTTP errors
    Network,
    /// Backup file and other I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Refresh cycle errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the hindsight crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Check if this error is recoverable (a later attempt may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_transient(),
            Self::Backup(e) => !e.is_corrupt(),
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Config(_) => false,
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) | Self::Template(_) => false,
            Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Backup(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Scheduler(SchedulerError::ConfigError { .. })
            | Self::Scheduler(SchedulerError::InvalidTimezone { .. })
            | Self::Config(_) => ErrorCategory::Config,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Json(_) | Self::Template(_) | Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let fetch_err = Error::Fetch(FetchError::Status(503));
        assert_eq!(fetch_err.category(), ErrorCategory::Network);

        let config_err = Error::Config(ConfigError::MissingApiKey);
        assert_eq!(config_err.category(), ErrorCategory::Config);

        let tz_err: Error = SchedulerError::invalid_timezone("Nowhere").into();
        assert_eq!(tz_err.category(), ErrorCategory::Config);

        let cycle_err: Error = SchedulerError::NoSuccessfulFetches { attempted: 3 }.into();
        assert_eq!(cycle_err.category(), ErrorCategory::Scheduler);
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::Fetch(FetchError::Status(503)).is_recoverable());
        assert!(!Error::Fetch(FetchError::MissingColumn("XYZ".into())).is_recoverable());
        assert!(!Error::Config(ConfigError::ZeroTopK).is_recoverable());

        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(Error::from(io_err).is_recoverable());
    }

    #[test]
    fn test_corrupt_backup_is_not_recoverable() {
        let decode = rmp_serde::from_slice::<crate::models::Selection>(b"\xc1").unwrap_err();
        let err: Error = BackupError::from(decode).into();
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_other_error() {
        let err = Error::other("Something went wrong");
        assert_eq!(err.category(), ErrorCategory::Other);
        assert_eq!(err.to_string(), "Something went wrong");
        assert_eq!(ErrorCategory::Other.as_str(), "other");
    }
}
