//! Google Cloud provider for cloudsweep
//!
//! This crate implements the CloudProvider trait for Google Cloud,
//! enumerating and deleting project resources through the gcloud CLI.
//!
//! # Features
//!
//! - VPC networks, subnets, routers, Cloud NAT and firewall rules
//! - Service accounts, custom roles and resource-level IAM bindings
//! - Pub/Sub, Cloud Storage, Secret Manager, Artifact Registry
//! - Cloud Run, Cloud Functions, Cloud Scheduler, log sinks
//!
//! # Requirements
//!
//! - `gcloud` CLI must be installed and logged in
//! - Authentication is managed through gcloud configuration
//!
//! # Example
//!
//! ```ignore
//! use cloudsweep_cloud::{CloudProvider, ResourceFilter, ResourceKind};
//! use cloudsweep_cloud_gcp::GcpProvider;
//!
//! let provider = GcpProvider::new("my-project");
//!
//! // Check authentication
//! let auth = provider.check_auth().await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//!
//! let filter = ResourceFilter::new().with_prefix("dspm");
//! let buckets = provider.list(ResourceKind::StorageBucket, &filter).await?;
//! ```

pub mod error;
pub mod gcloud;
pub mod provider;

pub use error::{GcpError, Result, classify_gcloud_error};
pub use gcloud::Gcloud;
pub use provider::{DEFAULT_REGION, GcpProvider};
