//! Azure provider error types

use cloudsweep_cloud::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("az not found. Please install: brew install azure-cli")]
    AzNotFound,

    #[error("az authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("az command failed: {0}")]
    CommandFailed(String),

    #[error("Missing '{field}' on {kind} {id}")]
    MissingField {
        kind: String,
        id: String,
        field: &'static str,
    },

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AzureError>;

const PROTECTED: &[&str] = &["ScopeLocked"];

const NOT_FOUND: &[&str] = &[
    "ResourceNotFound",
    "ResourceGroupNotFound",
    "could not be found",
    "does not exist",
    "NotFound",
];

const PERMISSION: &[&str] = &["AuthorizationFailed", "Forbidden", "Insufficient privileges"];

const TRANSIENT: &[&str] = &[
    "TooManyRequests",
    "429",
    "Conflict",
    "is in use",
    "InUseSubnetCannotBeDeleted",
    "retry",
];

/// Classify a failed az call from its stderr
pub fn classify_az_error(stderr: &str) -> ProviderError {
    let message = stderr.trim().to_string();
    let has = |needles: &[&str]| needles.iter().any(|n| stderr.contains(n));

    if has(PROTECTED) {
        ProviderError::Protected(message)
    } else if has(NOT_FOUND) {
        ProviderError::NotFound(message)
    } else if has(PERMISSION) {
        ProviderError::Permission(message)
    } else if has(TRANSIENT) {
        ProviderError::Transient(message)
    } else {
        ProviderError::Command(message)
    }
}

impl From<AzureError> for ProviderError {
    fn from(e: AzureError) -> Self {
        match e {
            AzureError::CommandFailed(stderr) => classify_az_error(&stderr),
            AzureError::AuthenticationFailed(msg) => ProviderError::Permission(msg),
            AzureError::Unsupported(msg) => ProviderError::Unsupported(msg),
            AzureError::JsonError(e) => ProviderError::Parse(e.to_string()),
            other => ProviderError::Command(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_lock_is_protected() {
        let err = classify_az_error(
            "(ScopeLocked) The scope '/subscriptions/s/resourceGroups/dspm-rg' cannot perform delete operation because following scope(s) are locked",
        );
        assert!(matches!(err, ProviderError::Protected(_)));
    }

    #[test]
    fn test_not_found() {
        assert!(classify_az_error("(ResourceGroupNotFound) Resource group 'dspm-rg' could not be found.").is_not_found());
        assert!(classify_az_error("Resource 'dspm-app' does not exist").is_not_found());
    }

    #[test]
    fn test_permission() {
        let err = classify_az_error("(AuthorizationFailed) The client does not have authorization");
        assert!(matches!(err, ProviderError::Permission(_)));
        let err = classify_az_error("Insufficient privileges to complete the operation.");
        assert!(matches!(err, ProviderError::Permission(_)));
    }

    #[test]
    fn test_transient() {
        assert!(classify_az_error("(Conflict) Another operation is in progress").is_retryable());
        assert!(classify_az_error("(InUseSubnetCannotBeDeleted) Subnet is in use").is_retryable());
        assert!(classify_az_error("(TooManyRequests) slow down").is_retryable());
    }

    #[test]
    fn test_unknown_is_command() {
        assert!(matches!(
            classify_az_error("ERROR: unrecognized arguments: --bogus"),
            ProviderError::Command(_)
        ));
    }
}
