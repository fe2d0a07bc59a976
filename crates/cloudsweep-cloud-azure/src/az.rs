//! az CLI wrapper
//!
//! Wraps the az commands used to enumerate and delete Azure resources.
//! Resource Manager commands are scoped to one subscription; Microsoft Graph
//! commands (`az ad ...`) are tenant-wide and reject `--subscription`.

use crate::error::{AzureError, Result};
use cloudsweep_cloud::{ResourceDescriptor, ResourceKind};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;

/// az CLI wrapper bound to one subscription
pub struct Az {
    subscription: String,
}

impl Az {
    pub fn new(subscription: impl Into<String>) -> Self {
        Self {
            subscription: subscription.into(),
        }
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    /// Check if az is installed and logged in to the subscription
    pub async fn check_auth(&self) -> Result<AccountInfo> {
        let which = Command::new("which").arg("az").output().await?;

        if !which.status.success() {
            return Err(AzureError::AzNotFound);
        }

        let output = self
            .run_command(&args(&["account", "show"]))
            .await
            .map_err(|e| match e {
                AzureError::CommandFailed(stderr) => AzureError::AuthenticationFailed(stderr),
                other => other,
            })?;
        Ok(serde_json::from_str(&output)?)
    }

    /// Run a Resource Manager command and return stdout
    pub async fn run_command(&self, args: &[String]) -> Result<String> {
        self.run(args, true).await
    }

    /// Run a Microsoft Graph command and return stdout
    pub async fn run_graph(&self, args: &[String]) -> Result<String> {
        self.run(args, false).await
    }

    async fn run(&self, args: &[String], scoped: bool) -> Result<String> {
        let mut cmd = Command::new("az");
        cmd.args(args);
        if scoped {
            cmd.arg("--subscription").arg(&self.subscription);
        }
        cmd.arg("--output").arg("json");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        if scoped {
            tracing::debug!(
                "Running: az {} --subscription {} --output json",
                args.join(" "),
                self.subscription
            );
        } else {
            tracing::debug!("Running: az {} --output json", args.join(" "));
        }

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AzureError::CommandFailed(stderr.to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Parse a JSON array, treating empty output as no items
pub fn parse_list<T: DeserializeOwned>(output: &str) -> Result<Vec<T>> {
    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed == "[]" {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Graph commands run tenant-wide
pub fn is_graph_kind(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::AppRegistration | ResourceKind::ServicePrincipal
    )
}

/// OData filter narrowing Entra listings to a display name prefix
pub fn display_name_filter(prefix: &str) -> String {
    format!("startswith(displayName,'{}')", prefix.replace('\'', "''"))
}

// ========== Argument builders ==========

/// Listing command for one kind. Entra kinds need the name prefix.
pub fn list_args(kind: ResourceKind, prefix: Option<&str>) -> Option<Vec<String>> {
    let a = match kind {
        ResourceKind::ResourceGroup => args(&["group", "list"]),
        ResourceKind::StorageAccount => args(&["storage", "account", "list"]),
        ResourceKind::KeyVault => args(&["keyvault", "list"]),
        ResourceKind::FunctionApp => args(&["functionapp", "list"]),
        ResourceKind::ManagedIdentity => args(&["identity", "list"]),
        ResourceKind::AppRegistration | ResourceKind::ServicePrincipal => {
            let prefix = prefix?;
            let group = if kind == ResourceKind::AppRegistration { "app" } else { "sp" };
            let mut a = args(&["ad", group, "list", "--filter"]);
            a.push(display_name_filter(prefix));
            a
        }
        _ => return None,
    };
    Some(a)
}

/// Deletion command for a descriptor
pub fn delete_args(descriptor: &ResourceDescriptor) -> Result<Vec<String>> {
    let name = descriptor.display_name.as_str();
    let in_group = |verb: &[&str]| -> Result<Vec<String>> {
        let group = resource_group_of(descriptor)?;
        let mut a = args(verb);
        a.extend(args(&["--name", name, "--resource-group", group.as_str()]));
        Ok(a)
    };

    let a = match descriptor.kind {
        ResourceKind::ResourceGroup => args(&["group", "delete", "--name", name, "--yes"]),
        ResourceKind::StorageAccount => {
            let mut a = in_group(&["storage", "account", "delete"])?;
            a.push("--yes".to_string());
            a
        }
        ResourceKind::KeyVault => in_group(&["keyvault", "delete"])?,
        ResourceKind::FunctionApp => in_group(&["functionapp", "delete"])?,
        ResourceKind::ManagedIdentity => in_group(&["identity", "delete"])?,
        ResourceKind::AppRegistration => args(&["ad", "app", "delete", "--id", descriptor.id.as_str()]),
        ResourceKind::ServicePrincipal => args(&["ad", "sp", "delete", "--id", descriptor.id.as_str()]),
        ResourceKind::IamRoleBinding => {
            let assignment = descriptor
                .binding_target()
                .and_then(|t| t.binding.id)
                .ok_or_else(|| missing(descriptor, "role assignment id"))?;
            args(&["role", "assignment", "delete", "--ids", assignment.as_str()])
        }
        other => {
            return Err(AzureError::Unsupported(format!(
                "{} is not an Azure resource",
                other
            )));
        }
    };
    Ok(a)
}

/// Role assignments made directly on a resource
pub fn role_assignment_args(arm_id: &str) -> Vec<String> {
    args(&["role", "assignment", "list", "--scope", arm_id])
}

fn resource_group_of(descriptor: &ResourceDescriptor) -> Result<String> {
    descriptor
        .get_metadata::<String>("resource_group")
        .ok_or_else(|| missing(descriptor, "resource_group"))
}

fn missing(descriptor: &ResourceDescriptor, field: &'static str) -> AzureError {
    AzureError::MissingField {
        kind: descriptor.kind.to_string(),
        id: descriptor.id.clone(),
        field,
    }
}

// ========== JSON shapes ==========

/// Output of `az account show`
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: Option<AccountUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountUser {
    pub name: String,
}

/// Common shape of Resource Manager resources
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmResource {
    /// Full resource id (`/subscriptions/.../resourceGroups/...`)
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub resource_group: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub managed_by: Option<String>,
}

/// Entra application or service principal
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryObject {
    /// Object id
    pub id: String,
    pub app_id: String,
    pub display_name: String,
    #[serde(default)]
    pub service_principal_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub id: String,
    pub role_definition_name: String,
    pub principal_id: String,
    #[serde(default)]
    pub principal_name: Option<String>,
    #[serde(default)]
    pub principal_type: Option<String>,
    pub scope: String,
}
