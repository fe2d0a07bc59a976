//! Protection policy
//!
//! A deny-list of resources that must never be deleted, whatever the cleanup
//! filter says: provider service agents, auto-generated repositories and
//! buckets, managed network rules. The policy is consulted before every delete
//! call and in dry-run mode alike.

use crate::error::{CloudError, Result};
use crate::resource::{Provider, ResourceDescriptor, ResourceKind};
use regex::Regex;

/// One deny-list entry: optional provider/kind scope plus a name pattern
#[derive(Debug, Clone)]
pub struct ProtectionRule {
    pub provider: Option<Provider>,
    pub kind: Option<ResourceKind>,
    pub pattern: Regex,
    pub reason: String,
}

impl ProtectionRule {
    pub fn new(
        provider: Option<Provider>,
        kind: Option<ResourceKind>,
        pattern: &str,
        reason: impl Into<String>,
    ) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            CloudError::InvalidConfig(format!("invalid protection pattern '{}': {}", pattern, e))
        })?;
        Ok(Self {
            provider,
            kind,
            pattern,
            reason: reason.into(),
        })
    }

    fn builtin(provider: Provider, kind: Option<ResourceKind>, pattern: &str, reason: &str) -> Self {
        Self::new(Some(provider), kind, pattern, reason).expect("built-in protection pattern")
    }

    /// Pattern is matched against both the display name and the id
    pub fn matches(&self, descriptor: &ResourceDescriptor) -> bool {
        if self.provider.is_some_and(|p| p != descriptor.provider) {
            return false;
        }
        if self.kind.is_some_and(|k| k != descriptor.kind) {
            return false;
        }
        self.pattern.is_match(&descriptor.display_name) || self.pattern.is_match(&descriptor.id)
    }
}

/// Ordered set of protection rules; the first matching rule wins
#[derive(Debug, Clone, Default)]
pub struct ProtectionPolicy {
    rules: Vec<ProtectionRule>,
}

impl ProtectionPolicy {
    /// Policy without any rule
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in rules for a provider
    pub fn for_provider(provider: Provider) -> Self {
        let rules = match provider {
            Provider::Gcp => vec![
                ProtectionRule::builtin(
                    Provider::Gcp,
                    Some(ResourceKind::FirewallRule),
                    r"^(default-allow-|gke-|k8s-)",
                    "cloud-managed firewall rule",
                ),
                ProtectionRule::builtin(
                    Provider::Gcp,
                    Some(ResourceKind::ArtifactRepository),
                    r"gcf-artifacts$",
                    "auto-generated Cloud Functions artifact repository",
                ),
                ProtectionRule::builtin(
                    Provider::Gcp,
                    Some(ResourceKind::StorageBucket),
                    r"^gcf(-v2)?-(sources|uploads)-|^(artifacts|staging)\..*\.appspot\.com$|_cloudbuild$",
                    "auto-generated storage bucket",
                ),
                ProtectionRule::builtin(
                    Provider::Gcp,
                    Some(ResourceKind::ServiceAccount),
                    r"@gcp-sa-[a-z0-9-]+\.iam\.gserviceaccount\.com$|^service-\d+@|@cloudservices\.gserviceaccount\.com$|@cloudbuild\.gserviceaccount\.com$|-compute@developer\.gserviceaccount\.com$|@appspot\.gserviceaccount\.com$",
                    "Google-managed service agent",
                ),
                ProtectionRule::builtin(
                    Provider::Gcp,
                    Some(ResourceKind::IamRoleBinding),
                    r"serviceAccount:(service-\d+@|\d+@cloudservices\.gserviceaccount\.com|\d+@cloudbuild\.gserviceaccount\.com|[a-z0-9-]+@gcp-sa-)",
                    "binding held by a Google-managed service agent",
                ),
            ],
            Provider::Azure => vec![
                ProtectionRule::builtin(
                    Provider::Azure,
                    Some(ResourceKind::ResourceGroup),
                    r"^(NetworkWatcherRG|DefaultResourceGroup-.*|MC_.*|cloud-shell-storage-.*)$",
                    "Azure-managed resource group",
                ),
                ProtectionRule::builtin(
                    Provider::Azure,
                    Some(ResourceKind::ServicePrincipal),
                    r"^Microsoft",
                    "Microsoft first-party service principal",
                ),
                ProtectionRule::builtin(
                    Provider::Azure,
                    Some(ResourceKind::AppRegistration),
                    r"^Microsoft",
                    "Microsoft first-party application",
                ),
            ],
        };
        Self { rules }
    }

    /// Append rules; existing rules keep precedence
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = ProtectionRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn rules(&self) -> &[ProtectionRule] {
        &self.rules
    }

    /// Find the rule protecting a resource.
    ///
    /// A synthetic IAM binding is also protected when its owner is.
    pub fn check(&self, descriptor: &ResourceDescriptor) -> Option<&ProtectionRule> {
        if let Some(rule) = self.rules.iter().find(|r| r.matches(descriptor)) {
            return Some(rule);
        }

        let target = descriptor.binding_target()?;
        let owner = ResourceDescriptor::new(
            target.owner.provider,
            target.owner.kind,
            target.owner.id,
            target.owner_name,
        );
        self.rules.iter().find(|r| r.matches(&owner))
    }

    pub fn is_protected(&self, descriptor: &ResourceDescriptor) -> bool {
        self.check(descriptor).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Binding;

    fn gcp(kind: ResourceKind, name: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(Provider::Gcp, kind, name, name)
    }

    #[test]
    fn test_builtin_rules_compile() {
        assert!(!ProtectionPolicy::for_provider(Provider::Gcp).rules().is_empty());
        assert!(!ProtectionPolicy::for_provider(Provider::Azure).rules().is_empty());
    }

    #[test]
    fn test_gcf_artifacts_repository_is_protected() {
        let policy = ProtectionPolicy::for_provider(Provider::Gcp);
        let repo = gcp(ResourceKind::ArtifactRepository, "dspm-gcf-artifacts");
        let rule = policy.check(&repo).unwrap();
        assert!(rule.reason.contains("artifact repository"));
        assert!(!policy.is_protected(&gcp(ResourceKind::ArtifactRepository, "dspm-images")));
    }

    #[test]
    fn test_service_agents_are_protected() {
        let policy = ProtectionPolicy::for_provider(Provider::Gcp);
        let agent = ResourceDescriptor::new(
            Provider::Gcp,
            ResourceKind::ServiceAccount,
            "service-123456@gcp-sa-pubsub.iam.gserviceaccount.com",
            "service-123456",
        );
        assert!(policy.is_protected(&agent));

        let own = ResourceDescriptor::new(
            Provider::Gcp,
            ResourceKind::ServiceAccount,
            "dspm-scanner@proj.iam.gserviceaccount.com",
            "dspm-scanner",
        );
        assert!(!policy.is_protected(&own));
    }

    #[test]
    fn test_rule_scoped_to_kind_and_provider() {
        let policy = ProtectionPolicy::for_provider(Provider::Gcp);
        // Same name, different kind
        assert!(!policy.is_protected(&gcp(ResourceKind::StorageBucket, "gke-cluster-logs")));
        assert!(policy.is_protected(&gcp(ResourceKind::FirewallRule, "gke-cluster-allow")));

        let azure_rg =
            ResourceDescriptor::new(Provider::Azure, ResourceKind::ResourceGroup, "MC_x", "MC_x");
        assert!(!policy.is_protected(&azure_rg));
        assert!(ProtectionPolicy::for_provider(Provider::Azure).is_protected(&azure_rg));
    }

    #[test]
    fn test_binding_inherits_owner_protection() {
        let policy = ProtectionPolicy::for_provider(Provider::Gcp);
        let repo = gcp(ResourceKind::ArtifactRepository, "dspm-gcf-artifacts");
        let binding = ResourceDescriptor::iam_binding(
            &repo,
            Binding::new("roles/artifactregistry.reader", "user:dev@example.com"),
        );
        assert!(policy.is_protected(&binding));
    }

    #[test]
    fn test_service_agent_binding_is_protected() {
        let policy = ProtectionPolicy::for_provider(Provider::Gcp);
        let topic = gcp(ResourceKind::PubSubTopic, "dspm-events");
        let agent_binding = ResourceDescriptor::iam_binding(
            &topic,
            Binding::new(
                "roles/pubsub.publisher",
                "serviceAccount:service-42@gcp-sa-pubsub.iam.gserviceaccount.com",
            ),
        );
        let user_binding = ResourceDescriptor::iam_binding(
            &topic,
            Binding::new("roles/pubsub.publisher", "serviceAccount:dspm@p.iam.gserviceaccount.com"),
        );
        assert!(policy.is_protected(&agent_binding));
        assert!(!policy.is_protected(&user_binding));
    }

    #[test]
    fn test_extra_rules_are_additive() {
        let extra =
            ProtectionRule::new(None, None, r"^dspm-keep-", "kept by operator").unwrap();
        let policy = ProtectionPolicy::for_provider(Provider::Gcp).with_rules([extra]);
        assert!(policy.is_protected(&gcp(ResourceKind::Secret, "dspm-keep-token")));
        assert!(policy.is_protected(&gcp(ResourceKind::ArtifactRepository, "x-gcf-artifacts")));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = ProtectionRule::new(None, None, "([", "broken").unwrap_err();
        assert!(matches!(err, CloudError::InvalidConfig(_)));
    }
}
