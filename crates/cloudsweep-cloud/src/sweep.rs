//! High-level entry point tying discovery, planning and execution together

use crate::error::Result;
use crate::executor::{ExecutionConfig, Executor};
use crate::filter::ResourceFilter;
use crate::graph::{GraphBuilder, ResourceGraph};
use crate::plan::{self, DeletionPlan};
use crate::protection::ProtectionPolicy;
use crate::provider::CloudProvider;
use crate::report::RunReport;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Discovery plus plan for one filter
#[derive(Debug, Clone)]
pub struct SweepPreview {
    pub graph: ResourceGraph,
    pub plan: DeletionPlan,
}

/// Runs sweeps for one provider adapter
pub struct Sweeper {
    provider: Arc<dyn CloudProvider>,
    policy: ProtectionPolicy,
    config: ExecutionConfig,
}

impl Sweeper {
    /// Sweeper with the provider's built-in protection rules
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        let policy = ProtectionPolicy::for_provider(provider.provider());
        Self {
            provider,
            policy,
            config: ExecutionConfig::default(),
        }
    }

    pub fn with_policy(mut self, policy: ProtectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn CloudProvider {
        self.provider.as_ref()
    }

    /// Discover matching resources
    pub async fn discover(&self, filter: &ResourceFilter) -> Result<ResourceGraph> {
        GraphBuilder::new(self.provider.as_ref())
            .with_call_timeout(self.config.call_timeout)
            .with_concurrency(self.config.concurrency)
            .build(filter)
            .await
    }

    /// Discover and plan without touching anything
    pub async fn preview(&self, filter: &ResourceFilter) -> Result<SweepPreview> {
        let graph = self.discover(filter).await?;
        let plan = plan::plan(&graph)?;
        Ok(SweepPreview { graph, plan })
    }

    /// Execute an already computed preview
    pub async fn execute(&self, preview: &SweepPreview, cancel: &CancellationToken) -> RunReport {
        let executor = Executor::new(self.provider.as_ref(), &self.policy, self.config.clone());
        let mut report = executor.execute(&preview.plan, cancel).await;
        report.discovery_warnings = preview.graph.warnings.clone();
        report
    }

    /// Discover, plan and execute (or preview, in dry-run mode)
    pub async fn run(&self, filter: &ResourceFilter, cancel: &CancellationToken) -> Result<RunReport> {
        let preview = self.preview(filter).await?;
        Ok(self.execute(&preview, cancel).await)
    }
}
