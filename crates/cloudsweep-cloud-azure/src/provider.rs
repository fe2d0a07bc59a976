//! Azure provider implementation

use crate::az::{self, AccountInfo, ArmResource, Az, DirectoryObject, RoleAssignment};
use crate::error::AzureError;
use async_trait::async_trait;
use cloudsweep_cloud::{
    AuthStatus, Binding, CloudProvider, Provider, ProviderError, ResourceDescriptor,
    ResourceFilter, ResourceKey, ResourceKind,
};
use serde_json::json;

/// Azure provider
pub struct AzureProvider {
    az: Az,
    subscription: String,
}

impl AzureProvider {
    pub fn new(subscription: impl Into<String>) -> Self {
        let subscription = subscription.into();
        Self {
            az: Az::new(&subscription),
            subscription,
        }
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }
}

#[async_trait]
impl CloudProvider for AzureProvider {
    fn name(&self) -> &str {
        "azure"
    }

    fn display_name(&self) -> &str {
        "Azure"
    }

    fn provider(&self) -> Provider {
        Provider::Azure
    }

    fn scope_id(&self) -> &str {
        &self.subscription
    }

    async fn check_auth(&self) -> Result<AuthStatus, ProviderError> {
        match self.az.check_auth().await {
            Ok(account) => Ok(AuthStatus::ok(account_label(&account))),
            Err(AzureError::AzNotFound) => Ok(AuthStatus::failed(AzureError::AzNotFound.to_string())),
            Err(AzureError::AuthenticationFailed(msg)) => Ok(AuthStatus::failed(msg)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(
        &self,
        kind: ResourceKind,
        filter: &ResourceFilter,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let prefix = filter.name_prefix.as_deref().filter(|p| !p.is_empty());
        let Some(args) = az::list_args(kind, prefix) else {
            if az::is_graph_kind(kind) {
                tracing::warn!(kind = %kind, "Entra objects carry no labels, a name prefix is required");
                return Ok(Vec::new());
            }
            return Err(ProviderError::Unsupported(format!(
                "{} cannot be listed on Azure",
                kind
            )));
        };

        let output = if az::is_graph_kind(kind) {
            self.az.run_graph(&args).await?
        } else {
            self.az.run_command(&args).await?
        };
        let resources = to_descriptors(kind, &output)?;
        tracing::debug!(kind = %kind, count = resources.len(), "Listed resources");
        Ok(resources)
    }

    async fn delete(&self, descriptor: &ResourceDescriptor) -> Result<(), ProviderError> {
        let args = az::delete_args(descriptor)?;
        if az::is_graph_kind(descriptor.kind) {
            self.az.run_graph(&args).await?;
        } else {
            self.az.run_command(&args).await?;
        }
        Ok(())
    }

    async fn list_iam_bindings(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<Vec<Binding>, ProviderError> {
        let Some(arm_id) = descriptor.get_metadata::<String>("arm_id") else {
            return Ok(Vec::new());
        };
        let output = self
            .az
            .run_command(&az::role_assignment_args(&arm_id))
            .await?;
        let assignments: Vec<RoleAssignment> = az::parse_list(&output)?;
        Ok(direct_bindings(&arm_id, assignments))
    }
}

fn account_label(account: &AccountInfo) -> String {
    match &account.user {
        Some(user) => format!("{} ({})", user.name, account.id),
        None => account.id.clone(),
    }
}

/// Assignments made at exactly `scope`; inherited ones belong to a parent
pub fn direct_bindings(scope: &str, assignments: Vec<RoleAssignment>) -> Vec<Binding> {
    assignments
        .into_iter()
        .filter(|a| a.scope.eq_ignore_ascii_case(scope))
        .map(|a| {
            let member = a.principal_name.unwrap_or(a.principal_id);
            Binding::new(a.role_definition_name, member).with_id(a.id)
        })
        .collect()
}

/// Resource group segment of a Resource Manager id
pub fn resource_group_from_id(arm_id: &str) -> Option<&str> {
    let mut segments = arm_id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourceGroups") {
            return segments.next();
        }
    }
    None
}

/// Group keys are lowercase: Azure reports the same group in varying case
fn group_key(group: &str) -> ResourceKey {
    ResourceKey::new(
        Provider::Azure,
        ResourceKind::ResourceGroup,
        group.to_ascii_lowercase(),
    )
}

fn arm_descriptor(kind: ResourceKind, resource: ArmResource) -> Result<ResourceDescriptor, ProviderError> {
    let mut descriptor = if kind == ResourceKind::ResourceGroup {
        ResourceDescriptor::new(Provider::Azure, kind, resource.name.to_ascii_lowercase(), &resource.name)
            .with_metadata(json!({
                "arm_id": resource.id,
                "managed_by": resource.managed_by,
            }))
    } else {
        let group = resource
            .resource_group
            .clone()
            .or_else(|| resource_group_from_id(&resource.id).map(str::to_string))
            .ok_or_else(|| {
                ProviderError::from(AzureError::MissingField {
                    kind: kind.to_string(),
                    id: resource.id.clone(),
                    field: "resourceGroup",
                })
            })?;
        let parent = group_key(&group);
        ResourceDescriptor::new(
            Provider::Azure,
            kind,
            format!("{}/{}", parent.id, resource.name),
            &resource.name,
        )
        .with_parent(parent)
        .with_metadata(json!({
            "arm_id": resource.id,
            "resource_group": group,
        }))
    };

    if let Some(location) = resource.location {
        descriptor = descriptor.with_region(location.to_ascii_lowercase());
    }
    if let Some(tags) = resource.tags {
        descriptor = descriptor.with_labels(tags);
    }
    Ok(descriptor)
}

/// Convert one listing's JSON output into descriptors
pub fn to_descriptors(
    kind: ResourceKind,
    output: &str,
) -> Result<Vec<ResourceDescriptor>, ProviderError> {
    match kind {
        ResourceKind::ResourceGroup
        | ResourceKind::StorageAccount
        | ResourceKind::KeyVault
        | ResourceKind::FunctionApp
        | ResourceKind::ManagedIdentity => az::parse_list::<ArmResource>(output)?
            .into_iter()
            .map(|r| arm_descriptor(kind, r))
            .collect(),
        ResourceKind::AppRegistration => Ok(az::parse_list::<DirectoryObject>(output)?
            .into_iter()
            .map(|app| {
                ResourceDescriptor::new(Provider::Azure, kind, &app.app_id, &app.display_name)
                    .with_metadata(json!({ "object_id": app.id }))
            })
            .collect()),
        ResourceKind::ServicePrincipal => Ok(az::parse_list::<DirectoryObject>(output)?
            .into_iter()
            .map(|sp| {
                ResourceDescriptor::new(Provider::Azure, kind, &sp.id, &sp.display_name)
                    .with_parent(ResourceKey::new(
                        Provider::Azure,
                        ResourceKind::AppRegistration,
                        &sp.app_id,
                    ))
                    .with_metadata(json!({
                        "app_id": sp.app_id,
                        "service_principal_type": sp.service_principal_type,
                    }))
            })
            .collect()),
        other => Err(ProviderError::Unsupported(format!(
            "{} cannot be listed on Azure",
            other
        ))),
    }
}
