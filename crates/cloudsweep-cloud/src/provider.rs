//! Cloud provider trait definition

use crate::error::ProviderError;
use crate::filter::ResourceFilter;
use crate::resource::{Binding, Provider, ResourceDescriptor, ResourceKind};
use async_trait::async_trait;
use backon::ExponentialBuilder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloud provider abstraction trait
///
/// All cloud providers (GCP, Azure) implement this trait so the engine never
/// looks at raw CLI output. Implementations should return
/// [`ProviderError::NotFound`] for resources that are already gone and
/// [`ProviderError::Transient`] for anything worth retrying.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "gcp", "azure")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    fn provider(&self) -> Provider;

    /// Project id or subscription id the adapter is bound to
    fn scope_id(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus, ProviderError>;

    /// Kinds this adapter can enumerate
    fn supported_kinds(&self) -> Vec<ResourceKind> {
        ResourceKind::listable_for(self.provider())
    }

    /// List resources of one kind. The filter may be used to narrow the
    /// query; the engine re-applies it to whatever comes back.
    async fn list(
        &self,
        kind: ResourceKind,
        filter: &ResourceFilter,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError>;

    /// Delete a single resource
    async fn delete(&self, descriptor: &ResourceDescriptor) -> Result<(), ProviderError>;

    /// Resource-level IAM bindings of a resource
    async fn list_iam_bindings(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<Vec<Binding>, ProviderError>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Retry configuration for provider operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first call
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f32,
}

impl RetryConfig {
    /// Exponential backoff with jitter bounded by `max_attempts`
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.backoff_multiplier)
            .with_jitter()
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}
