//! gcloud CLI wrapper
//!
//! Wraps the gcloud commands used to enumerate and delete resources, plus the
//! JSON shapes they return. Argument lists are built by plain functions so
//! they can be checked without a gcloud binary.

use crate::error::{GcpError, Result};
use cloudsweep_cloud::{BindingTarget, ResourceDescriptor, ResourceKind};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;

/// gcloud CLI wrapper bound to one project
pub struct Gcloud {
    project: String,
}

impl Gcloud {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Check if gcloud is installed and has an active account
    pub async fn check_auth(&self) -> Result<GcloudAccount> {
        let which = Command::new("which").arg("gcloud").output().await?;

        if !which.status.success() {
            return Err(GcpError::GcloudNotFound);
        }

        let accounts: Vec<GcloudAccount> = self
            .run_json(&args(&["auth", "list", "--filter=status:ACTIVE"]))
            .await?;

        accounts
            .into_iter()
            .find(|a| a.status.eq_ignore_ascii_case("ACTIVE"))
            .ok_or_else(|| {
                GcpError::AuthenticationFailed(
                    "no active account, run `gcloud auth login`".to_string(),
                )
            })
    }

    /// Run a gcloud command and return stdout
    pub async fn run_command(&self, args: &[String]) -> Result<String> {
        let mut cmd = Command::new("gcloud");
        cmd.args(args);
        cmd.arg("--project").arg(&self.project);
        cmd.arg("--format=json");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!(
            "Running: gcloud {} --project {} --format=json",
            args.join(" "),
            self.project
        );

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GcpError::CommandFailed(stderr.to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a listing command and parse its JSON array
    pub async fn run_json<T: DeserializeOwned>(&self, args: &[String]) -> Result<Vec<T>> {
        let output = self.run_command(args).await?;
        parse_list(&output)
    }

    /// Run a command whose output is a single JSON object
    pub async fn run_object<T: DeserializeOwned>(&self, args: &[String]) -> Result<T> {
        let output = self.run_command(args).await?;
        Ok(serde_json::from_str(&output)?)
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

// ========== Argument builders ==========

/// Listing invocations for one kind. Most kinds need a single call;
/// scheduler jobs are listed once per location.
pub fn list_args(kind: ResourceKind, regions: &[String]) -> Vec<Vec<String>> {
    let region_flag = |mut base: Vec<String>| {
        if !regions.is_empty() {
            base.push("--regions".to_string());
            base.push(regions.join(","));
        }
        base
    };

    match kind {
        ResourceKind::ComputeNetwork => vec![args(&["compute", "networks", "list"])],
        ResourceKind::Subnet => vec![region_flag(args(&["compute", "networks", "subnets", "list"]))],
        ResourceKind::Router | ResourceKind::Nat => {
            vec![region_flag(args(&["compute", "routers", "list"]))]
        }
        ResourceKind::FirewallRule => vec![args(&["compute", "firewall-rules", "list"])],
        ResourceKind::ServiceAccount => vec![args(&["iam", "service-accounts", "list"])],
        ResourceKind::PubSubTopic => vec![args(&["pubsub", "topics", "list"])],
        ResourceKind::PubSubSubscription => vec![args(&["pubsub", "subscriptions", "list"])],
        ResourceKind::StorageBucket => vec![args(&["storage", "buckets", "list"])],
        ResourceKind::Secret => vec![args(&["secrets", "list"])],
        ResourceKind::CloudRunService => vec![args(&["run", "services", "list"])],
        ResourceKind::CloudFunction => vec![args(&["functions", "list"])],
        ResourceKind::SchedulerJob => regions
            .iter()
            .map(|location| {
                let mut a = args(&["scheduler", "jobs", "list", "--location"]);
                a.push(location.clone());
                a
            })
            .collect(),
        ResourceKind::LogSink => vec![args(&["logging", "sinks", "list"])],
        ResourceKind::CustomRole => vec![args(&["iam", "roles", "list"])],
        ResourceKind::ArtifactRepository => vec![args(&["artifacts", "repositories", "list"])],
        _ => Vec::new(),
    }
}

/// Deletion command for a descriptor
pub fn delete_args(project: &str, descriptor: &ResourceDescriptor) -> Result<Vec<String>> {
    let id = descriptor.id.as_str();
    let kind = descriptor.kind;

    let a = match kind {
        ResourceKind::ComputeNetwork => with_quiet(&["compute", "networks", "delete", id]),
        ResourceKind::Subnet => {
            let [region, name] = split_id::<2>(descriptor)?;
            with_quiet(&["compute", "networks", "subnets", "delete", name, "--region", region])
        }
        ResourceKind::Router => {
            let [region, name] = split_id::<2>(descriptor)?;
            with_quiet(&["compute", "routers", "delete", name, "--region", region])
        }
        ResourceKind::Nat => {
            let [region, router, name] = split_id::<3>(descriptor)?;
            with_quiet(&[
                "compute", "routers", "nats", "delete", name, "--router", router, "--region",
                region,
            ])
        }
        ResourceKind::FirewallRule => with_quiet(&["compute", "firewall-rules", "delete", id]),
        ResourceKind::ServiceAccount => with_quiet(&["iam", "service-accounts", "delete", id]),
        ResourceKind::PubSubTopic => with_quiet(&["pubsub", "topics", "delete", id]),
        ResourceKind::PubSubSubscription => with_quiet(&["pubsub", "subscriptions", "delete", id]),
        ResourceKind::StorageBucket => {
            let url = format!("gs://{}", id);
            args(&["storage", "rm", "--recursive", url.as_str()])
        }
        ResourceKind::Secret => with_quiet(&["secrets", "delete", id]),
        ResourceKind::CloudRunService => {
            let [region, name] = split_id::<2>(descriptor)?;
            with_quiet(&["run", "services", "delete", name, "--region", region])
        }
        ResourceKind::CloudFunction => {
            let [region, name] = split_id::<2>(descriptor)?;
            with_quiet(&["functions", "delete", name, "--region", region])
        }
        ResourceKind::SchedulerJob => {
            let [location, name] = split_id::<2>(descriptor)?;
            with_quiet(&["scheduler", "jobs", "delete", name, "--location", location])
        }
        ResourceKind::LogSink => with_quiet(&["logging", "sinks", "delete", id]),
        ResourceKind::CustomRole => with_quiet(&["iam", "roles", "delete", id]),
        ResourceKind::ArtifactRepository => {
            let [location, name] = split_id::<2>(descriptor)?;
            with_quiet(&["artifacts", "repositories", "delete", name, "--location", location])
        }
        ResourceKind::IamRoleBinding => {
            let target = descriptor.binding_target().ok_or_else(|| GcpError::InvalidId {
                kind: kind.to_string(),
                id: descriptor.id.clone(),
            })?;
            return remove_binding_args(project, &target);
        }
        other => {
            return Err(GcpError::Unsupported(format!(
                "{} is not a Google Cloud resource",
                other
            )));
        }
    };

    Ok(a)
}

/// `get-iam-policy` command for kinds that carry bindings
pub fn get_iam_policy_args(
    project: &str,
    kind: ResourceKind,
    id: &str,
) -> Result<Option<Vec<String>>> {
    Ok(iam_resource(project, kind, id)?.map(|(group, target)| {
        let mut a = args(&group);
        a.push("get-iam-policy".to_string());
        a.extend(target);
        a
    }))
}

/// `remove-iam-policy-binding` command for a synthetic binding
pub fn remove_binding_args(project: &str, target: &BindingTarget) -> Result<Vec<String>> {
    let (group, resource) = iam_resource(project, target.owner.kind, &target.owner.id)?
        .ok_or_else(|| {
            GcpError::Unsupported(format!(
                "{} does not carry IAM bindings",
                target.owner.kind
            ))
        })?;

    let mut a = args(&group);
    a.push("remove-iam-policy-binding".to_string());
    a.extend(resource);
    a.push("--member".to_string());
    a.push(target.binding.member.clone());
    a.push("--role".to_string());
    a.push(target.binding.role.clone());
    Ok(a)
}

/// Command group and target arguments of a resource's IAM policy.
/// Service accounts are granted roles on the project policy.
fn iam_resource(
    project: &str,
    kind: ResourceKind,
    id: &str,
) -> Result<Option<(Vec<&'static str>, Vec<String>)>> {
    let located = |flag: &str| -> Result<Vec<String>> {
        let (location, name) = id.split_once('/').ok_or_else(|| GcpError::InvalidId {
            kind: kind.to_string(),
            id: id.to_string(),
        })?;
        Ok(args(&[name, flag, location]))
    };

    let resource = match kind {
        ResourceKind::StorageBucket => (vec!["storage", "buckets"], vec![format!("gs://{}", id)]),
        ResourceKind::Secret => (vec!["secrets"], vec![id.to_string()]),
        ResourceKind::PubSubTopic => (vec!["pubsub", "topics"], vec![id.to_string()]),
        ResourceKind::ArtifactRepository => {
            (vec!["artifacts", "repositories"], located("--location")?)
        }
        ResourceKind::CloudRunService => (vec!["run", "services"], located("--region")?),
        ResourceKind::ServiceAccount => (vec!["projects"], vec![project.to_string()]),
        _ => return Ok(None),
    };
    Ok(Some(resource))
}

fn with_quiet(parts: &[&str]) -> Vec<String> {
    let mut a = args(parts);
    a.push("--quiet".to_string());
    a
}

fn split_id<const N: usize>(descriptor: &ResourceDescriptor) -> Result<[&str; N]> {
    let parts: Vec<&str> = descriptor.id.splitn(N, '/').collect();
    parts
        .try_into()
        .ok()
        .filter(|p: &[&str; N]| p.iter().all(|s| !s.is_empty()))
        .ok_or_else(|| GcpError::InvalidId {
            kind: descriptor.kind.to_string(),
            id: descriptor.id.clone(),
        })
}

/// Last path segment of a resource name or self link
pub fn short_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Location segment of `projects/P/locations/L/...` names
pub fn location_of(path: &str) -> Option<&str> {
    let mut segments = path.split('/');
    while let Some(segment) = segments.next() {
        if segment == "locations" {
            return segments.next();
        }
    }
    None
}

// ========== JSON shapes ==========

/// Account entry of `gcloud auth list`
#[derive(Debug, Clone, Deserialize)]
pub struct GcloudAccount {
    pub account: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub name: String,
    #[serde(default)]
    pub auto_create_subnetworks: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetworkInfo {
    pub name: String,
    /// Region self link
    pub region: String,
    /// Network self link
    pub network: String,
    #[serde(default)]
    pub ip_cidr_range: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterInfo {
    pub name: String,
    pub region: String,
    pub network: String,
    #[serde(default)]
    pub nats: Vec<NatInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatInfo {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirewallInfo {
    pub name: String,
    pub network: String,
    #[serde(default)]
    pub direction: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountInfo {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// Pub/Sub topics, secrets, functions and repositories share this shape
#[derive(Debug, Clone, Deserialize)]
pub struct LabeledInfo {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionInfo {
    pub name: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Cloud Run services come back as Knative objects
#[derive(Debug, Clone, Deserialize)]
pub struct RunServiceInfo {
    pub metadata: RunServiceMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunServiceMetadata {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl RunServiceInfo {
    pub const LOCATION_LABEL: &'static str = "cloud.googleapis.com/location";

    pub fn region(&self) -> Option<&str> {
        self.metadata
            .labels
            .get(Self::LOCATION_LABEL)
            .map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerJobInfo {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSinkInfo {
    pub name: String,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub writer_identity: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleInfo {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IamPolicy {
    #[serde(default)]
    pub bindings: Vec<PolicyBinding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyBinding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub condition: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudsweep_cloud::{Binding, Provider};

    fn descriptor(kind: ResourceKind, id: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(Provider::Gcp, kind, id, short_name(id))
    }

    #[test]
    fn test_list_args_scopes_regions() {
        let regions = vec!["us-central1".to_string(), "europe-west1".to_string()];
        let subnet = list_args(ResourceKind::Subnet, &regions);
        assert_eq!(
            subnet,
            vec![args(&[
                "compute",
                "networks",
                "subnets",
                "list",
                "--regions",
                "us-central1,europe-west1"
            ])]
        );

        let jobs = list_args(ResourceKind::SchedulerJob, &regions);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].last().map(String::as_str), Some("europe-west1"));

        assert!(list_args(ResourceKind::ResourceGroup, &regions).is_empty());
    }

    #[test]
    fn test_nat_is_listed_through_routers() {
        assert_eq!(
            list_args(ResourceKind::Nat, &[]),
            list_args(ResourceKind::Router, &[])
        );
    }

    #[test]
    fn test_delete_args_regional() {
        let nat = descriptor(ResourceKind::Nat, "us-central1/dspm-router/dspm-nat");
        assert_eq!(
            delete_args("p", &nat).unwrap(),
            args(&[
                "compute",
                "routers",
                "nats",
                "delete",
                "dspm-nat",
                "--router",
                "dspm-router",
                "--region",
                "us-central1",
                "--quiet"
            ])
        );

        let run = descriptor(ResourceKind::CloudRunService, "us-east1/dspm-api");
        assert_eq!(
            delete_args("p", &run).unwrap(),
            args(&["run", "services", "delete", "dspm-api", "--region", "us-east1", "--quiet"])
        );
    }

    #[test]
    fn test_delete_bucket_removes_contents() {
        let bucket = descriptor(ResourceKind::StorageBucket, "dspm-data");
        assert_eq!(
            delete_args("p", &bucket).unwrap(),
            args(&["storage", "rm", "--recursive", "gs://dspm-data"])
        );
    }

    #[test]
    fn test_delete_args_rejects_malformed_id() {
        let subnet = descriptor(ResourceKind::Subnet, "dspm-subnet");
        assert!(matches!(
            delete_args("p", &subnet),
            Err(GcpError::InvalidId { .. })
        ));

        let group = ResourceDescriptor::new(Provider::Azure, ResourceKind::ResourceGroup, "rg", "rg");
        assert!(matches!(
            delete_args("p", &group),
            Err(GcpError::Unsupported(_))
        ));
    }

    #[test]
    fn test_remove_binding_args() {
        let sa = descriptor(ResourceKind::ServiceAccount, "dspm-sa@p.iam.gserviceaccount.com");
        let binding = ResourceDescriptor::iam_binding(
            &sa,
            Binding::new("roles/viewer", "serviceAccount:dspm-sa@p.iam.gserviceaccount.com"),
        );
        assert_eq!(
            delete_args("my-project", &binding).unwrap(),
            args(&[
                "projects",
                "remove-iam-policy-binding",
                "my-project",
                "--member",
                "serviceAccount:dspm-sa@p.iam.gserviceaccount.com",
                "--role",
                "roles/viewer"
            ])
        );

        let repo = descriptor(ResourceKind::ArtifactRepository, "us/dspm-images");
        let binding = ResourceDescriptor::iam_binding(&repo, Binding::new("roles/artifactregistry.reader", "allUsers"));
        let a = delete_args("p", &binding).unwrap();
        assert_eq!(&a[..5], &args(&["artifacts", "repositories", "remove-iam-policy-binding", "dspm-images", "--location"])[..]);
    }

    #[test]
    fn test_get_iam_policy_args() {
        assert_eq!(
            get_iam_policy_args("p", ResourceKind::StorageBucket, "dspm-data").unwrap(),
            Some(args(&["storage", "buckets", "get-iam-policy", "gs://dspm-data"]))
        );
        assert_eq!(
            get_iam_policy_args("p", ResourceKind::ComputeNetwork, "net").unwrap(),
            None
        );
    }

    #[test]
    fn test_name_helpers() {
        assert_eq!(
            short_name("https://www.googleapis.com/compute/v1/projects/p/regions/us-central1"),
            "us-central1"
        );
        assert_eq!(short_name("dspm-net"), "dspm-net");
        assert_eq!(
            location_of("projects/p/locations/europe-west1/jobs/dspm-nightly"),
            Some("europe-west1")
        );
        assert_eq!(location_of("projects/p/topics/t"), None);
    }

    #[test]
    fn test_parse_empty_output() {
        let items: Vec<NetworkInfo> = parse_list("").unwrap();
        assert!(items.is_empty());
        let items: Vec<NetworkInfo> = parse_list("[]\n").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_parse_policy() {
        let policy: IamPolicy = serde_json::from_str(
            r#"{"bindings":[{"role":"roles/storage.objectViewer","members":["allUsers","user:a@b.c"]}],"etag":"BwX"}"#,
        )
        .unwrap();
        assert_eq!(policy.bindings[0].members.len(), 2);
        let empty: IamPolicy = serde_json::from_str(r#"{"etag":"ACAB"}"#).unwrap();
        assert!(empty.bindings.is_empty());
    }
}
