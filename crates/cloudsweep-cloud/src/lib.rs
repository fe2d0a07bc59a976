//! cloudsweep cloud engine
//!
//! This crate discovers the cloud resources that belong to one deployment
//! (by name prefix and/or labels) and deletes them in dependency order.
//!
//! # Supported Providers
//!
//! - **GCP**: networking, IAM, Pub/Sub, Storage, Secret Manager, Cloud Run,
//!   Functions, Scheduler, Logging, Artifact Registry (via gcloud CLI)
//! - **Azure**: resource groups, storage, Key Vault, Functions, identities,
//!   Entra applications (via az CLI)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 cloudsweep CLI                   │
//! │          (sweep discover / delete)               │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                cloudsweep-cloud                  │
//! │  ┌──────────────┐ ┌──────────┐ ┌─────────────┐  │
//! │  │ GraphBuilder │→│ Planner  │→│  Executor   │  │
//! │  └──────┬───────┘ └──────────┘ └──────┬──────┘  │
//! │         │      trait CloudProvider    │         │
//! │         │                    ProtectionPolicy   │
//! └─────────┼─────────────────────────────┼─────────┘
//!           │                             │
//!   ┌───────▼───────┐             ┌───────▼───────┐
//!   │  gcp provider │             │ azure provider│
//!   └───────────────┘             └───────────────┘
//! ```

pub mod error;
pub mod executor;
pub mod filter;
pub mod graph;
pub mod plan;
pub mod protection;
pub mod provider;
pub mod report;
pub mod resource;
pub mod sweep;

#[cfg(test)]
mod mock;

// Re-exports
pub use error::{CloudError, ProviderError, Result};
pub use executor::{DEFAULT_CALL_TIMEOUT, DEFAULT_CONCURRENCY, ExecutionConfig, Executor};
pub use filter::ResourceFilter;
pub use graph::{DependencyEdge, DiscoveryWarning, GraphBuilder, ResourceGraph};
pub use plan::{Batch, DeletionPlan, PlanSummary, plan};
pub use protection::{ProtectionPolicy, ProtectionRule};
pub use provider::{AuthStatus, CloudProvider, RetryConfig};
pub use report::{DeletionOutcome, DeletionStatus, ReportSummary, RunReport, SkipReason};
pub use resource::{
    Binding, BindingTarget, DependencyRank, Provider, ResourceDescriptor, ResourceKey,
    ResourceKind,
};
pub use sweep::{SweepPreview, Sweeper};
pub use tokio_util::sync::CancellationToken;
