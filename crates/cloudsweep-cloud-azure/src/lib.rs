//! Azure provider for cloudsweep
//!
//! This crate implements the CloudProvider trait for Azure, enumerating and
//! deleting subscription resources and Entra objects through the az CLI.
//!
//! # Features
//!
//! - Resource groups, storage accounts, Key Vaults, Function Apps
//! - User-assigned managed identities
//! - Entra app registrations and service principals (name prefix only)
//! - Role assignments made directly on a resource
//!
//! # Requirements
//!
//! - `az` CLI must be installed and logged in (`az login`)
//! - Entra objects additionally need Microsoft Graph directory permissions
//!
//! # Example
//!
//! ```ignore
//! use cloudsweep_cloud::{CloudProvider, ResourceFilter, ResourceKind};
//! use cloudsweep_cloud_azure::AzureProvider;
//!
//! let provider = AzureProvider::new("00000000-0000-0000-0000-000000000000");
//!
//! let auth = provider.check_auth().await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//!
//! let filter = ResourceFilter::new().with_prefix("dspm");
//! let groups = provider.list(ResourceKind::ResourceGroup, &filter).await?;
//! ```

pub mod az;
pub mod error;
pub mod provider;

pub use az::Az;
pub use error::{AzureError, Result, classify_az_error};
pub use provider::AzureProvider;
