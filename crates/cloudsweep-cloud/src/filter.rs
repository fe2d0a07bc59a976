//! Structured resource filter

use crate::error::{CloudError, Result};
use crate::resource::ResourceDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Criterion selecting the resources that belong to one deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFilter {
    /// Resources whose name starts with this prefix
    pub name_prefix: Option<String>,

    /// Every pair must be present on the resource's labels/tags
    #[serde(default)]
    pub label_selector: BTreeMap<String, String>,

    /// Region scope; empty means every region
    #[serde(default)]
    pub regions: Vec<String>,
}

impl ResourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.label_selector.insert(key.into(), value.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.regions.push(region.into());
        self
    }

    /// Parse a `KEY=VALUE` selector term
    pub fn parse_label(term: &str) -> Result<(String, String)> {
        match term.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
            _ => Err(CloudError::InvalidFilter(format!(
                "label selector must look like KEY=VALUE, got '{}'",
                term
            ))),
        }
    }

    /// Reject filters that would select an entire tenant
    pub fn validate(&self) -> Result<()> {
        let has_prefix = self
            .name_prefix
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if !has_prefix && self.label_selector.is_empty() {
            return Err(CloudError::InvalidFilter(
                "a name prefix or a label selector is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn matches(&self, descriptor: &ResourceDescriptor) -> bool {
        self.matches_name(descriptor) && self.matches_labels(descriptor) && self.matches_region(descriptor)
    }

    /// Ids can be composite (`region/name`, `group/name`), so only the
    /// display name is compared
    fn matches_name(&self, descriptor: &ResourceDescriptor) -> bool {
        match self.name_prefix.as_deref() {
            None | Some("") => true,
            Some(prefix) => descriptor.display_name.starts_with(prefix),
        }
    }

    fn matches_labels(&self, descriptor: &ResourceDescriptor) -> bool {
        self.label_selector
            .iter()
            .all(|(k, v)| descriptor.labels.get(k) == Some(v))
    }

    /// Global resources always pass the region scope
    fn matches_region(&self, descriptor: &ResourceDescriptor) -> bool {
        match &descriptor.region {
            Some(region) if !self.regions.is_empty() => self.regions.iter().any(|r| r == region),
            _ => true,
        }
    }
}
