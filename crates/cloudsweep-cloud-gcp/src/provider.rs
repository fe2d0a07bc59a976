//! Google Cloud provider implementation

use crate::error::GcpError;
use crate::gcloud::{
    self, BucketInfo, FirewallInfo, Gcloud, IamPolicy, LabeledInfo, LogSinkInfo, NetworkInfo,
    RoleInfo, RouterInfo, RunServiceInfo, SchedulerJobInfo, ServiceAccountInfo, SubnetworkInfo,
    SubscriptionInfo, location_of, short_name,
};
use async_trait::async_trait;
use cloudsweep_cloud::{
    AuthStatus, Binding, CloudProvider, Provider, ProviderError, ResourceDescriptor,
    ResourceFilter, ResourceKey, ResourceKind,
};
use serde_json::json;
use tokio::sync::OnceCell;

/// Region used for location-scoped listings when the filter names none
pub const DEFAULT_REGION: &str = "us-central1";

/// Google Cloud provider
pub struct GcpProvider {
    gcloud: Gcloud,
    project: String,
    default_region: String,
    /// Project policy, fetched once and shared by every service account lookup
    project_policy: OnceCell<IamPolicy>,
}

impl GcpProvider {
    pub fn new(project: impl Into<String>) -> Self {
        let project = project.into();
        Self {
            gcloud: Gcloud::new(&project),
            project,
            default_region: DEFAULT_REGION.to_string(),
            project_policy: OnceCell::new(),
        }
    }

    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn list_regions(&self, kind: ResourceKind, filter: &ResourceFilter) -> Vec<String> {
        if kind == ResourceKind::SchedulerJob && filter.regions.is_empty() {
            vec![self.default_region.clone()]
        } else {
            filter.regions.clone()
        }
    }

    /// Project-level roles granted to a service account
    async fn service_account_bindings(&self, email: &str) -> Result<Vec<Binding>, ProviderError> {
        let policy = self
            .project_policy
            .get_or_try_init(|| async {
                tracing::debug!(project = %self.project, "Fetching project IAM policy");
                self.gcloud
                    .run_object::<IamPolicy>(&[
                        "projects".to_string(),
                        "get-iam-policy".to_string(),
                        self.project.clone(),
                    ])
                    .await
            })
            .await?;
        Ok(bindings_for_member(policy, email))
    }
}

#[async_trait]
impl CloudProvider for GcpProvider {
    fn name(&self) -> &str {
        "gcp"
    }

    fn display_name(&self) -> &str {
        "Google Cloud"
    }

    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    fn scope_id(&self) -> &str {
        &self.project
    }

    async fn check_auth(&self) -> Result<AuthStatus, ProviderError> {
        match self.gcloud.check_auth().await {
            Ok(account) => Ok(AuthStatus::ok(account.account)),
            Err(GcpError::GcloudNotFound) => Ok(AuthStatus::failed(
                GcpError::GcloudNotFound.to_string(),
            )),
            Err(GcpError::AuthenticationFailed(msg)) => Ok(AuthStatus::failed(msg)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(
        &self,
        kind: ResourceKind,
        filter: &ResourceFilter,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let mut resources = Vec::new();
        for args in gcloud::list_args(kind, &self.list_regions(kind, filter)) {
            let output = self.gcloud.run_command(&args).await?;
            resources.extend(to_descriptors(kind, &output)?);
        }
        tracing::debug!(kind = %kind, count = resources.len(), "Listed resources");
        Ok(resources)
    }

    async fn delete(&self, descriptor: &ResourceDescriptor) -> Result<(), ProviderError> {
        let args = gcloud::delete_args(&self.project, descriptor)?;
        self.gcloud.run_command(&args).await?;
        Ok(())
    }

    async fn list_iam_bindings(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<Vec<Binding>, ProviderError> {
        if descriptor.kind == ResourceKind::ServiceAccount {
            return self.service_account_bindings(&descriptor.id).await;
        }

        let Some(args) = gcloud::get_iam_policy_args(&self.project, descriptor.kind, &descriptor.id)?
        else {
            return Ok(Vec::new());
        };
        let policy: IamPolicy = self.gcloud.run_object(&args).await?;
        Ok(policy_bindings(&policy))
    }
}

/// Every unconditional `(role, member)` pair of a policy
pub fn policy_bindings(policy: &IamPolicy) -> Vec<Binding> {
    policy
        .bindings
        .iter()
        .filter(|b| {
            if b.condition.is_some() {
                tracing::debug!(role = %b.role, "Skipping conditional binding");
                return false;
            }
            true
        })
        .flat_map(|b| b.members.iter().map(|m| Binding::new(&b.role, m)))
        .collect()
}

/// Bindings of a project policy that grant something to one service account
pub fn bindings_for_member(policy: &IamPolicy, email: &str) -> Vec<Binding> {
    let member = format!("serviceAccount:{}", email);
    policy_bindings(policy)
        .into_iter()
        .filter(|b| b.member == member)
        .collect()
}

fn network_key(network_link: &str) -> ResourceKey {
    ResourceKey::new(
        Provider::Gcp,
        ResourceKind::ComputeNetwork,
        short_name(network_link),
    )
}

fn descriptor(kind: ResourceKind, id: impl Into<String>, name: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(Provider::Gcp, kind, id, name)
}

/// Convert one listing's JSON output into descriptors
pub fn to_descriptors(
    kind: ResourceKind,
    output: &str,
) -> Result<Vec<ResourceDescriptor>, ProviderError> {
    let resources = match kind {
        ResourceKind::ComputeNetwork => gcloud::parse_list::<NetworkInfo>(output)?
            .into_iter()
            .map(|n| {
                descriptor(kind, &n.name, &n.name)
                    .with_metadata(json!({ "auto_create_subnetworks": n.auto_create_subnetworks }))
            })
            .collect(),
        ResourceKind::Subnet => gcloud::parse_list::<SubnetworkInfo>(output)?
            .into_iter()
            .map(|s| {
                let region = short_name(&s.region);
                descriptor(kind, format!("{}/{}", region, s.name), &s.name)
                    .with_region(region)
                    .with_parent(network_key(&s.network))
                    .with_metadata(json!({ "ip_cidr_range": s.ip_cidr_range }))
            })
            .collect(),
        ResourceKind::Router => gcloud::parse_list::<RouterInfo>(output)?
            .into_iter()
            .map(|r| {
                let region = short_name(&r.region);
                descriptor(kind, format!("{}/{}", region, r.name), &r.name)
                    .with_region(region)
                    .with_parent(network_key(&r.network))
            })
            .collect(),
        ResourceKind::Nat => gcloud::parse_list::<RouterInfo>(output)?
            .into_iter()
            .flat_map(|r| {
                let region = short_name(&r.region).to_string();
                let router = ResourceKey::new(
                    Provider::Gcp,
                    ResourceKind::Router,
                    format!("{}/{}", region, r.name),
                );
                let router_name = r.name;
                r.nats.into_iter().map(move |nat| {
                    descriptor(
                        ResourceKind::Nat,
                        format!("{}/{}/{}", region, router_name, nat.name),
                        &nat.name,
                    )
                    .with_region(region.clone())
                    .with_parent(router.clone())
                })
            })
            .collect(),
        ResourceKind::FirewallRule => gcloud::parse_list::<FirewallInfo>(output)?
            .into_iter()
            .map(|f| {
                descriptor(kind, &f.name, &f.name)
                    .with_parent(network_key(&f.network))
                    .with_metadata(json!({ "direction": f.direction }))
            })
            .collect(),
        ResourceKind::ServiceAccount => gcloud::parse_list::<ServiceAccountInfo>(output)?
            .into_iter()
            .map(|sa| {
                let account_id = sa.email.split('@').next().unwrap_or(&sa.email).to_string();
                descriptor(kind, &sa.email, &account_id).with_metadata(json!({
                    "display_name": sa.display_name,
                    "disabled": sa.disabled,
                }))
            })
            .collect(),
        ResourceKind::PubSubTopic | ResourceKind::Secret => {
            gcloud::parse_list::<LabeledInfo>(output)?
                .into_iter()
                .map(|t| {
                    let name = short_name(&t.name);
                    descriptor(kind, name, name).with_labels(t.labels)
                })
                .collect()
        }
        ResourceKind::PubSubSubscription => gcloud::parse_list::<SubscriptionInfo>(output)?
            .into_iter()
            .map(|s| {
                let name = short_name(&s.name);
                let mut d = descriptor(kind, name, name).with_labels(s.labels);
                // Detached subscriptions report "_deleted-topic_"
                if let Some(topic) = s.topic.as_deref().filter(|t| t.contains("/topics/")) {
                    d = d.with_parent(ResourceKey::new(
                        Provider::Gcp,
                        ResourceKind::PubSubTopic,
                        short_name(topic),
                    ));
                }
                d
            })
            .collect(),
        ResourceKind::StorageBucket => gcloud::parse_list::<BucketInfo>(output)?
            .into_iter()
            .map(|b| {
                let mut d = descriptor(kind, &b.name, &b.name).with_labels(b.labels);
                if let Some(location) = b.location {
                    d = d.with_region(location.to_ascii_lowercase());
                }
                d
            })
            .collect(),
        ResourceKind::CloudRunService => gcloud::parse_list::<RunServiceInfo>(output)?
            .into_iter()
            .map(|s| {
                let region = s.region().unwrap_or_default().to_string();
                let name = s.metadata.name.clone();
                let labels = s
                    .metadata
                    .labels
                    .into_iter()
                    .filter(|(k, _)| !k.contains('/'))
                    .collect();
                descriptor(kind, format!("{}/{}", region, name), &name)
                    .with_region(region)
                    .with_labels(labels)
            })
            .collect(),
        ResourceKind::CloudFunction | ResourceKind::ArtifactRepository => {
            gcloud::parse_list::<LabeledInfo>(output)?
                .into_iter()
                .map(|f| {
                    let name = short_name(&f.name);
                    let location = location_of(&f.name).unwrap_or_default();
                    descriptor(kind, format!("{}/{}", location, name), name)
                        .with_region(location)
                        .with_labels(f.labels)
                })
                .collect()
        }
        ResourceKind::SchedulerJob => gcloud::parse_list::<SchedulerJobInfo>(output)?
            .into_iter()
            .map(|j| {
                let name = short_name(&j.name);
                let location = location_of(&j.name).unwrap_or_default();
                descriptor(kind, format!("{}/{}", location, name), name)
                    .with_region(location)
                    .with_metadata(json!({ "state": j.state }))
            })
            .collect(),
        ResourceKind::LogSink => gcloud::parse_list::<LogSinkInfo>(output)?
            .into_iter()
            .map(|s| {
                descriptor(kind, &s.name, &s.name).with_metadata(json!({
                    "destination": s.destination,
                    "writer_identity": s.writer_identity,
                }))
            })
            .collect(),
        ResourceKind::CustomRole => gcloud::parse_list::<RoleInfo>(output)?
            .into_iter()
            .filter(|r| !r.deleted)
            .map(|r| {
                let id = short_name(&r.name);
                descriptor(kind, id, id).with_metadata(json!({ "title": r.title }))
            })
            .collect(),
        other => {
            return Err(ProviderError::Unsupported(format!(
                "{} cannot be listed on Google Cloud",
                other
            )));
        }
    };
    Ok(resources)
}
