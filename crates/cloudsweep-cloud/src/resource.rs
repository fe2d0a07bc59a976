//! Resource model: providers, kinds, descriptors and IAM bindings

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Cloud provider a resource lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Gcp,
    Azure,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gcp => "gcp",
            Provider::Azure => "azure",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gcp" | "google" => Ok(Provider::Gcp),
            "azure" | "az" => Ok(Provider::Azure),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Deletion priority of a resource kind. Higher ranks are deleted earlier.
pub type DependencyRank = u8;

/// Known resource kinds.
///
/// Declaration order doubles as the deterministic tie-break between kinds of
/// equal rank, so new variants go next to the kinds they share a rank with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    IamRoleBinding,
    SchedulerJob,
    LogSink,
    CloudRunService,
    CloudFunction,
    FunctionApp,
    PubSubSubscription,
    PubSubTopic,
    StorageBucket,
    StorageAccount,
    Secret,
    KeyVault,
    ArtifactRepository,
    FirewallRule,
    Nat,
    Router,
    Subnet,
    ComputeNetwork,
    CustomRole,
    ResourceGroup,
    ServicePrincipal,
    ServiceAccount,
    ManagedIdentity,
    AppRegistration,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 24] = [
        ResourceKind::IamRoleBinding,
        ResourceKind::SchedulerJob,
        ResourceKind::LogSink,
        ResourceKind::CloudRunService,
        ResourceKind::CloudFunction,
        ResourceKind::FunctionApp,
        ResourceKind::PubSubSubscription,
        ResourceKind::PubSubTopic,
        ResourceKind::StorageBucket,
        ResourceKind::StorageAccount,
        ResourceKind::Secret,
        ResourceKind::KeyVault,
        ResourceKind::ArtifactRepository,
        ResourceKind::FirewallRule,
        ResourceKind::Nat,
        ResourceKind::Router,
        ResourceKind::Subnet,
        ResourceKind::ComputeNetwork,
        ResourceKind::CustomRole,
        ResourceKind::ResourceGroup,
        ResourceKind::ServicePrincipal,
        ResourceKind::ServiceAccount,
        ResourceKind::ManagedIdentity,
        ResourceKind::AppRegistration,
    ];

    /// Static deletion rank.
    ///
    /// Bindings outrank every identity or resource they attach to, NAT
    /// outranks Router, Router outranks Subnet, Subnet outranks Network and
    /// identities come last.
    pub fn rank(&self) -> DependencyRank {
        match self {
            ResourceKind::IamRoleBinding => 8,
            ResourceKind::SchedulerJob | ResourceKind::LogSink => 7,
            ResourceKind::CloudRunService
            | ResourceKind::CloudFunction
            | ResourceKind::FunctionApp
            | ResourceKind::PubSubSubscription => 6,
            ResourceKind::PubSubTopic
            | ResourceKind::StorageBucket
            | ResourceKind::StorageAccount
            | ResourceKind::Secret
            | ResourceKind::KeyVault
            | ResourceKind::ArtifactRepository
            | ResourceKind::FirewallRule => 5,
            ResourceKind::Nat => 4,
            ResourceKind::Router => 3,
            ResourceKind::Subnet => 2,
            ResourceKind::ComputeNetwork
            | ResourceKind::CustomRole
            | ResourceKind::ResourceGroup
            | ResourceKind::ServicePrincipal => 1,
            ResourceKind::ServiceAccount
            | ResourceKind::ManagedIdentity
            | ResourceKind::AppRegistration => 0,
        }
    }

    /// Provider owning this kind; `None` for kinds shared by every provider
    pub fn provider(&self) -> Option<Provider> {
        match self {
            ResourceKind::IamRoleBinding => None,
            ResourceKind::FunctionApp
            | ResourceKind::StorageAccount
            | ResourceKind::KeyVault
            | ResourceKind::ResourceGroup
            | ResourceKind::ServicePrincipal
            | ResourceKind::ManagedIdentity
            | ResourceKind::AppRegistration => Some(Provider::Azure),
            _ => Some(Provider::Gcp),
        }
    }

    /// Whether the kind is enumerated by listing (bindings are derived)
    pub fn is_listable_on(&self, provider: Provider) -> bool {
        self.provider() == Some(provider)
    }

    /// Kinds whose instances carry their own IAM policy
    pub fn exposes_iam(&self) -> bool {
        matches!(
            self,
            ResourceKind::StorageBucket
                | ResourceKind::Secret
                | ResourceKind::PubSubTopic
                | ResourceKind::ArtifactRepository
                | ResourceKind::CloudRunService
                | ResourceKind::ServiceAccount
                | ResourceKind::ResourceGroup
                | ResourceKind::StorageAccount
                | ResourceKind::KeyVault
        )
    }

    /// Listable kinds of a provider, in declaration order
    pub fn listable_for(provider: Provider) -> Vec<ResourceKind> {
        Self::ALL
            .iter()
            .copied()
            .filter(|k| k.is_listable_on(provider))
            .collect()
    }

    /// Position in declaration order
    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::IamRoleBinding => "iam-role-binding",
            ResourceKind::SchedulerJob => "scheduler-job",
            ResourceKind::LogSink => "log-sink",
            ResourceKind::CloudRunService => "cloud-run-service",
            ResourceKind::CloudFunction => "cloud-function",
            ResourceKind::FunctionApp => "function-app",
            ResourceKind::PubSubSubscription => "pub-sub-subscription",
            ResourceKind::PubSubTopic => "pub-sub-topic",
            ResourceKind::StorageBucket => "storage-bucket",
            ResourceKind::StorageAccount => "storage-account",
            ResourceKind::Secret => "secret",
            ResourceKind::KeyVault => "key-vault",
            ResourceKind::ArtifactRepository => "artifact-repository",
            ResourceKind::FirewallRule => "firewall-rule",
            ResourceKind::Nat => "nat",
            ResourceKind::Router => "router",
            ResourceKind::Subnet => "subnet",
            ResourceKind::ComputeNetwork => "compute-network",
            ResourceKind::CustomRole => "custom-role",
            ResourceKind::ResourceGroup => "resource-group",
            ResourceKind::ServicePrincipal => "service-principal",
            ResourceKind::ServiceAccount => "service-account",
            ResourceKind::ManagedIdentity => "managed-identity",
            ResourceKind::AppRegistration => "app-registration",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("unknown resource kind: {}", s))
    }
}

/// Identity of a resource: `(provider, kind, id)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub provider: Provider,
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceKey {
    pub fn new(provider: Provider, kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.provider, self.kind, self.id)
    }
}

/// Immutable record describing one discovered cloud resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub provider: Provider,
    pub kind: ResourceKind,

    /// Provider-unique identifier within the kind
    pub id: String,

    /// Human-facing name, matched against the name prefix
    pub display_name: String,

    /// Region or location for regional resources
    pub region: Option<String>,

    pub labels: BTreeMap<String, String>,

    /// Raw provider payload, kept for adapters that need it on delete
    pub metadata: serde_json::Value,

    /// Resources this one must be deleted before
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<ResourceKey>,
}

impl ResourceDescriptor {
    pub fn new(
        provider: Provider,
        kind: ResourceKind,
        id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            kind,
            id: id.into(),
            display_name: display_name.into(),
            region: None,
            labels: BTreeMap::new(),
            metadata: serde_json::Value::Null,
            parents: Vec::new(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels.extend(labels);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_parent(mut self, parent: ResourceKey) -> Self {
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
        self
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.provider, self.kind, self.id.clone())
    }

    pub fn rank(&self) -> DependencyRank {
        self.kind.rank()
    }

    /// Build the synthetic descriptor for one IAM binding on `owner`
    pub fn iam_binding(owner: &ResourceDescriptor, binding: Binding) -> Self {
        let id = format!("{}:{}#{}#{}", owner.kind, owner.id, binding.role, binding.member);
        let display_name = format!("{} {} on {}", binding.role, binding.member, owner.display_name);
        let target = BindingTarget {
            owner: owner.key(),
            owner_name: owner.display_name.clone(),
            owner_region: owner.region.clone(),
            binding,
        };
        let metadata = serde_json::to_value(&target).unwrap_or(serde_json::Value::Null);

        let mut descriptor = Self::new(owner.provider, ResourceKind::IamRoleBinding, id, display_name)
            .with_metadata(metadata)
            .with_parent(owner.key());
        descriptor.region = owner.region.clone();
        descriptor
    }

    /// Binding details of a synthetic `IamRoleBinding` descriptor
    pub fn binding_target(&self) -> Option<BindingTarget> {
        if self.kind != ResourceKind::IamRoleBinding {
            return None;
        }
        serde_json::from_value(self.metadata.clone()).ok()
    }

    /// Read a metadata field as a specific type
    pub fn get_metadata<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.metadata
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// One role granted to one member on a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,
    pub member: String,

    /// Provider-side identifier (Azure role assignment id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Binding {
    pub fn new(role: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            member: member.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Where a synthetic binding lives, recovered from descriptor metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingTarget {
    pub owner: ResourceKey,
    pub owner_name: String,
    pub owner_region: Option<String>,
    pub binding: Binding,
}
