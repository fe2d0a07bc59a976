//! Google Cloud provider error types

use cloudsweep_cloud::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcpError {
    #[error("gcloud not found. Please install: https://cloud.google.com/sdk/docs/install")]
    GcloudNotFound,

    #[error("gcloud authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("gcloud command failed: {0}")]
    CommandFailed(String),

    #[error("Malformed resource id '{id}' for {kind}")]
    InvalidId { kind: String, id: String },

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GcpError>;

const NOT_FOUND: &[&str] = &["NOT_FOUND", "was not found", "404"];

const PERMISSION: &[&str] = &["PERMISSION_DENIED", "403", "does not have permission"];

const TRANSIENT: &[&str] = &[
    "RESOURCE_EXHAUSTED",
    "429",
    "rateLimitExceeded",
    "quota exceeded",
    "Quota exceeded",
    "is already being used",
    "resourceInUseByAnotherResource",
    "try again",
    "503",
    "UNAVAILABLE",
];

/// Classify a failed gcloud call from its stderr
pub fn classify_gcloud_error(stderr: &str) -> ProviderError {
    let message = stderr.trim().to_string();
    if contains_any(stderr, NOT_FOUND) {
        ProviderError::NotFound(message)
    } else if contains_any(stderr, PERMISSION) {
        ProviderError::Permission(message)
    } else if contains_any(stderr, TRANSIENT) {
        ProviderError::Transient(message)
    } else {
        ProviderError::Command(message)
    }
}

/// Substring match, except that HTTP status codes must stand alone so a
/// project number containing "404" is not read as a missing resource
fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| {
        if needle.chars().all(|c| c.is_ascii_digit()) {
            haystack
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| token == *needle)
        } else {
            haystack.contains(needle)
        }
    })
}

impl From<GcpError> for ProviderError {
    fn from(e: GcpError) -> Self {
        match e {
            GcpError::CommandFailed(stderr) => classify_gcloud_error(&stderr),
            GcpError::AuthenticationFailed(msg) => ProviderError::Permission(msg),
            GcpError::JsonError(e) => ProviderError::Parse(e.to_string()),
            GcpError::Unsupported(msg) => ProviderError::Unsupported(msg),
            other => ProviderError::Command(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = classify_gcloud_error(
            "ERROR: (gcloud.compute.networks.delete) Could not fetch resource:\n - The resource 'projects/p/global/networks/dspm-net' was not found",
        );
        assert!(err.is_not_found());
        assert!(classify_gcloud_error("HTTPError 404: bucket does not exist").is_not_found());
    }

    #[test]
    fn test_classify_in_use_is_transient() {
        let err = classify_gcloud_error(
            "ERROR: The network resource 'projects/p/global/networks/dspm-net' is already being used by 'projects/p/global/firewalls/dspm-fw'",
        );
        assert!(err.is_retryable());
        assert!(classify_gcloud_error("Error 429: rateLimitExceeded").is_retryable());
        assert!(classify_gcloud_error("503 UNAVAILABLE: try again later").is_retryable());
    }

    #[test]
    fn test_classify_permission() {
        let err = classify_gcloud_error(
            "ERROR: (gcloud.iam.roles.delete) PERMISSION_DENIED: Permission 'iam.roles.delete' denied",
        );
        assert!(matches!(err, ProviderError::Permission(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_codes_must_stand_alone() {
        let err = classify_gcloud_error("ERROR: invalid argument for project 1234045");
        assert!(matches!(err, ProviderError::Command(_)));
    }

    #[test]
    fn test_command_failed_is_classified() {
        let err: ProviderError = GcpError::CommandFailed("NOT_FOUND: secret".into()).into();
        assert!(err.is_not_found());
        let err: ProviderError = GcpError::GcloudNotFound.into();
        assert!(matches!(err, ProviderError::Command(_)));
    }
}
