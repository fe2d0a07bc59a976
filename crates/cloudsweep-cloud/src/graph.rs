//! Resource graph builder
//!
//! Enumerates every resource matching a filter through a [`CloudProvider`],
//! materializes resource-level IAM bindings as synthetic resources and records
//! the concrete parent/child edges observed while listing. The builder only
//! reads: running it twice against an unchanged tenant yields the same graph.

use crate::error::{CloudError, ProviderError, Result};
use crate::executor::{DEFAULT_CALL_TIMEOUT, DEFAULT_CONCURRENCY};
use crate::filter::ResourceFilter;
use crate::provider::CloudProvider;
use crate::resource::{ResourceDescriptor, ResourceKey, ResourceKind};
use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// `from` must be deleted in an earlier batch than `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: ResourceKey,
    pub to: ResourceKey,
}

/// A listing or IAM lookup that degraded to an empty result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryWarning {
    pub kind: ResourceKind,
    /// Resource whose IAM lookup failed, when the warning is about bindings
    pub resource: Option<ResourceKey>,
    pub message: String,
}

/// Matching resources and the explicit edges between them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGraph {
    pub resources: Vec<ResourceDescriptor>,
    pub edges: Vec<DependencyEdge>,
    pub warnings: Vec<DiscoveryWarning>,
}

impl ResourceGraph {
    /// Assemble a graph from descriptors, deduplicating by key and deriving
    /// edges from each descriptor's parents
    pub fn from_resources(resources: impl IntoIterator<Item = ResourceDescriptor>) -> Self {
        let mut graph = Self::default();
        let mut seen = HashSet::new();
        for descriptor in resources {
            if seen.insert(descriptor.key()) {
                graph.resources.push(descriptor);
            } else {
                debug!(key = %descriptor.key(), "Duplicate resource dropped");
            }
        }
        graph.edges = derive_edges(&graph.resources);
        graph
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.resources.iter().any(|r| &r.key() == key)
    }

    pub fn by_kind(&self, kind: ResourceKind) -> Vec<&ResourceDescriptor> {
        self.resources.iter().filter(|r| r.kind == kind).collect()
    }

    /// Resource keys, for comparing discovery runs
    pub fn keys(&self) -> Vec<ResourceKey> {
        self.resources.iter().map(|r| r.key()).collect()
    }
}

fn derive_edges(resources: &[ResourceDescriptor]) -> Vec<DependencyEdge> {
    let present: HashSet<ResourceKey> = resources.iter().map(|r| r.key()).collect();
    let mut edges = Vec::new();
    for descriptor in resources {
        for parent in &descriptor.parents {
            if present.contains(parent) {
                edges.push(DependencyEdge {
                    from: descriptor.key(),
                    to: parent.clone(),
                });
            }
        }
    }
    edges
}

/// Builds a [`ResourceGraph`] from a provider adapter
pub struct GraphBuilder<'a> {
    provider: &'a dyn CloudProvider,
    call_timeout: Duration,
    concurrency: usize,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(provider: &'a dyn CloudProvider) -> Self {
        Self {
            provider,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Upper bound on concurrent IAM lookups
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Discover every resource matching `filter`
    pub async fn build(&self, filter: &ResourceFilter) -> Result<ResourceGraph> {
        filter.validate()?;
        self.ensure_authenticated().await?;

        let kinds = self.provider.supported_kinds();
        info!(
            provider = %self.provider.name(),
            scope = %self.provider.scope_id(),
            kinds = kinds.len(),
            prefix = ?filter.name_prefix,
            "Discovering resources"
        );

        let listings = join_all(kinds.iter().map(|kind| self.list_kind(*kind, filter))).await;

        let mut warnings = Vec::new();
        let mut candidates = Vec::new();
        let mut succeeded = 0usize;
        for (kind, listing) in kinds.iter().zip(listings) {
            match listing {
                Ok(found) => {
                    succeeded += 1;
                    let total = found.len();
                    let matched: Vec<_> = found.into_iter().filter(|r| filter.matches(r)).collect();
                    debug!(kind = %kind, total, matched = matched.len(), "Listed");
                    candidates.extend(matched);
                }
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Listing failed, treating as empty");
                    warnings.push(DiscoveryWarning {
                        kind: *kind,
                        resource: None,
                        message: e.to_string(),
                    });
                }
            }
        }

        if !kinds.is_empty() && succeeded == 0 {
            return Err(CloudError::ProviderUnreachable(self.provider.name().to_string()));
        }

        let mut graph = ResourceGraph::from_resources(candidates);

        let bindings = self.collect_bindings(&graph.resources, &mut warnings).await;
        graph = ResourceGraph::from_resources(graph.resources.into_iter().chain(bindings));
        graph.warnings = warnings;

        info!(
            resources = graph.len(),
            edges = graph.edges.len(),
            warnings = graph.warnings.len(),
            "Discovery complete"
        );
        Ok(graph)
    }

    async fn ensure_authenticated(&self) -> Result<()> {
        let status = match timeout(self.call_timeout, self.provider.check_auth()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(CloudError::AuthenticationFailed {
                    provider: self.provider.name().to_string(),
                    message: e.to_string(),
                });
            }
            Err(_) => return Err(CloudError::ProviderUnreachable(self.provider.name().to_string())),
        };

        if !status.authenticated {
            return Err(CloudError::AuthenticationFailed {
                provider: self.provider.name().to_string(),
                message: status.error.unwrap_or_else(|| "not authenticated".to_string()),
            });
        }
        debug!(account = ?status.account_info, "Authenticated");
        Ok(())
    }

    async fn list_kind(
        &self,
        kind: ResourceKind,
        filter: &ResourceFilter,
    ) -> std::result::Result<Vec<ResourceDescriptor>, ProviderError> {
        match timeout(self.call_timeout, self.provider.list(kind, filter)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.call_timeout)),
        }
    }

    async fn collect_bindings(
        &self,
        resources: &[ResourceDescriptor],
        warnings: &mut Vec<DiscoveryWarning>,
    ) -> Vec<ResourceDescriptor> {
        let owners: Vec<&ResourceDescriptor> =
            resources.iter().filter(|r| r.kind.exposes_iam()).collect();
        if owners.is_empty() {
            return Vec::new();
        }

        let lookups: Vec<_> = stream::iter(owners.iter().map(|owner| async move {
            match timeout(self.call_timeout, self.provider.list_iam_bindings(owner)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.call_timeout)),
            }
        }))
        .buffered(self.concurrency)
        .collect()
        .await;

        let mut bindings = Vec::new();
        for (owner, lookup) in owners.into_iter().zip(lookups) {
            match lookup {
                Ok(found) => {
                    bindings.extend(
                        found
                            .into_iter()
                            .map(|b| ResourceDescriptor::iam_binding(owner, b)),
                    );
                }
                Err(e) => {
                    warn!(key = %owner.key(), error = %e, "IAM lookup failed, no bindings recorded");
                    warnings.push(DiscoveryWarning {
                        kind: ResourceKind::IamRoleBinding,
                        resource: Some(owner.key()),
                        message: e.to_string(),
                    });
                }
            }
        }
        bindings
    }
}
