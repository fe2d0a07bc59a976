//! Error types for the sweep engine
//!
//! Two layers exist. [`ProviderError`] classifies the outcome of a single
//! provider call and never escapes the execution engine; [`CloudError`] is a
//! run-level failure that aborts a sweep before any deletion happens.

use thiserror::Error;

/// Errors returned by a single provider call (list / delete / IAM lookup)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Throttling, eventual-consistency lag, resource still in use
    #[error("transient error: {0}")]
    Transient(String),

    #[error("call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Caller lacks the IAM permission; retrying will not help
    #[error("permission denied: {0}")]
    Permission(String),

    /// The resource is already gone
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider itself refused the deletion (lock, managed resource)
    #[error("protected by provider: {0}")]
    Protected(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("command failed: {0}")]
    Command(String),

    #[error("could not parse provider output: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Check if the call may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_) | ProviderError::Timeout(_))
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Parse(e.to_string())
    }
}

/// Fatal sweep errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Authentication failed for {provider}: {message}")]
    AuthenticationFailed { provider: String, message: String },

    #[error("Provider {0} is unreachable: every listing call failed")]
    ProviderUnreachable(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Dependency cycle detected between: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Transient("429".into()).is_retryable());
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!ProviderError::Permission("403".into()).is_retryable());
        assert!(!ProviderError::NotFound("gone".into()).is_retryable());
        assert!(!ProviderError::Protected("lock".into()).is_retryable());
        assert!(!ProviderError::Command("boom".into()).is_retryable());
    }

    #[test]
    fn test_cycle_message_lists_members() {
        let err = CloudError::DependencyCycle(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Dependency cycle detected between: a, b");
    }
}
