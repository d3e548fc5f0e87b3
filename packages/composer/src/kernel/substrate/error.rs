use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::kernel::workflow_config::ConfigError;

/// Classification of a step failure. The string form is what
/// `retry_policy.non_retryable_error_types` matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ConfigNotFound,
    ConfigParseError,
    CompanyNotFound,
    TargetNotFound,
    InvalidJob,
    LookupError,
    ContextExtractionError,
    GenerationError,
    PersistError,
    Timeout,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigNotFound => "ConfigNotFound",
            ErrorKind::ConfigParseError => "ConfigParseError",
            ErrorKind::CompanyNotFound => "CompanyNotFound",
            ErrorKind::TargetNotFound => "TargetNotFound",
            ErrorKind::InvalidJob => "InvalidJob",
            ErrorKind::LookupError => "LookupError",
            ErrorKind::ContextExtractionError => "ContextExtractionError",
            ErrorKind::GenerationError => "GenerationError",
            ErrorKind::PersistError => "PersistError",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Cancelled => "Cancelled",
        }
    }

    /// Kinds that are never retried, whatever the policy says.
    pub fn is_always_terminal(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConfigNotFound
                | ErrorKind::CompanyNotFound
                | ErrorKind::TargetNotFound
                | ErrorKind::InvalidJob
                | ErrorKind::Cancelled
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by a single step attempt, or by the retry loop once it gives up.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {message}")]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
    /// Attempts made before this error was surfaced (0 if none ran).
    pub attempts: u32,
}

impl StepError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: 0,
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancelled")
    }

    pub fn timeout(step: &str, after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("{} timed out after {:?}", step, after),
        )
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl From<ConfigError> for StepError {
    fn from(err: ConfigError) -> Self {
        let kind = match &err {
            ConfigError::NotFound { .. } | ConfigError::Unreadable { .. } => {
                ErrorKind::ConfigNotFound
            }
            ConfigError::Parse { .. } | ConfigError::Invalid { .. } => ErrorKind::ConfigParseError,
        };
        StepError::new(kind, err.to_string())
    }
}

/// Why a started pipeline did not produce an output.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubstrateError {
    #[error("pipeline {id} failed after {} attempt(s): {source}", .source.attempts)]
    Failed { id: String, source: StepError },

    #[error("pipeline {id} exceeded its execution timeout of {timeout:?}")]
    TimedOut { id: String, timeout: Duration },

    #[error("pipeline {id} was cancelled")]
    Cancelled { id: String },

    #[error("pipeline {id} panicked: {message}")]
    Panicked { id: String, message: String },
}

impl SubstrateError {
    pub fn id(&self) -> &str {
        match self {
            SubstrateError::Failed { id, .. }
            | SubstrateError::TimedOut { id, .. }
            | SubstrateError::Cancelled { id }
            | SubstrateError::Panicked { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_kinds_are_terminal() {
        assert!(ErrorKind::CompanyNotFound.is_always_terminal());
        assert!(ErrorKind::TargetNotFound.is_always_terminal());
        assert!(ErrorKind::ConfigNotFound.is_always_terminal());
        assert!(!ErrorKind::GenerationError.is_always_terminal());
        assert!(!ErrorKind::Timeout.is_always_terminal());
    }

    #[test]
    fn test_config_error_mapping() {
        let missing: StepError = ConfigError::NotFound {
            resource: "x.yaml".into(),
        }
        .into();
        assert_eq!(missing.kind, ErrorKind::ConfigNotFound);

        let invalid: StepError = ConfigError::Invalid {
            field: "retry_policy.backoff_coefficient".into(),
            message: "must be at least 1.0".into(),
        }
        .into();
        assert_eq!(invalid.kind, ErrorKind::ConfigParseError);
        assert!(invalid.message.contains("backoff_coefficient"));
    }

    #[test]
    fn test_failed_display_includes_attempts() {
        let err = SubstrateError::Failed {
            id: "target-workflow-a".into(),
            source: StepError::new(ErrorKind::ConfigParseError, "bad").with_attempts(3),
        };
        assert_eq!(
            err.to_string(),
            "pipeline target-workflow-a failed after 3 attempt(s): ConfigParseError: bad"
        );
    }
}
