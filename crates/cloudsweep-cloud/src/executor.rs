//! Execution engine
//!
//! Walks a [`DeletionPlan`] batch by batch. Inside a batch, deletions run in
//! waves of at most `concurrency` concurrent calls; the next batch starts only
//! once every resource of the current one has a terminal outcome. Errors are
//! captured per resource and never abort the run.

use crate::error::ProviderError;
use crate::plan::DeletionPlan;
use crate::protection::ProtectionPolicy;
use crate::provider::{CloudProvider, RetryConfig};
use crate::report::{DeletionOutcome, DeletionStatus, RunReport, SkipReason};
use crate::resource::ResourceDescriptor;
use backon::Retryable;
use futures_util::future::join_all;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of concurrent deletions inside a batch
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default timeout for a single provider call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Execution settings for one run
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Preview only: protection is still evaluated, nothing is deleted
    pub dry_run: bool,

    /// Maximum concurrent deletions inside a batch
    pub concurrency: usize,

    /// Timeout applied to every provider call
    pub call_timeout: Duration,

    pub retry: RetryConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Executes deletion plans against a provider
pub struct Executor<'a> {
    provider: &'a dyn CloudProvider,
    policy: &'a ProtectionPolicy,
    config: ExecutionConfig,
}

impl<'a> Executor<'a> {
    pub fn new(
        provider: &'a dyn CloudProvider,
        policy: &'a ProtectionPolicy,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            provider,
            policy,
            config,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run a plan to completion, or until `cancel` fires
    pub async fn execute(&self, plan: &DeletionPlan, cancel: &CancellationToken) -> RunReport {
        let mut report = RunReport::new(
            self.provider.provider(),
            self.provider.scope_id(),
            self.config.dry_run,
        );
        let wave_size = self.config.concurrency.max(1);

        info!(
            batches = plan.batches.len(),
            resources = plan.len(),
            concurrency = wave_size,
            dry_run = self.config.dry_run,
            "Executing deletion plan"
        );

        for batch in &plan.batches {
            for wave in batch.resources.chunks(wave_size) {
                if cancel.is_cancelled() {
                    for descriptor in wave {
                        report.record(self.cancelled(descriptor, batch.index));
                    }
                    continue;
                }

                debug!(batch = batch.index, size = wave.len(), "Dispatching wave");
                let outcomes = join_all(wave.iter().map(|d| self.execute_one(d, batch.index))).await;
                for outcome in outcomes {
                    report.record(outcome);
                }
            }
        }

        report.finish();
        info!(summary = %report.summary(), "Plan executed");
        report
    }

    fn cancelled(&self, descriptor: &ResourceDescriptor, batch: usize) -> DeletionOutcome {
        let status = match self.policy.check(descriptor) {
            Some(rule) => DeletionStatus::Protected(rule.reason.clone()),
            None => DeletionStatus::Skipped(SkipReason::Cancelled),
        };
        DeletionOutcome {
            descriptor: descriptor.clone(),
            status,
            attempts: 0,
            duration_ms: 0,
            batch,
        }
    }

    async fn execute_one(&self, descriptor: &ResourceDescriptor, batch: usize) -> DeletionOutcome {
        let start = Instant::now();
        let key = descriptor.key();

        if let Some(rule) = self.policy.check(descriptor) {
            info!(key = %key, reason = %rule.reason, "Protected, not deleting");
            return DeletionOutcome {
                descriptor: descriptor.clone(),
                status: DeletionStatus::Protected(rule.reason.clone()),
                attempts: 0,
                duration_ms: start.elapsed().as_millis() as u64,
                batch,
            };
        }

        if self.config.dry_run {
            info!(key = %key, "[DRY RUN] Would delete");
            return DeletionOutcome {
                descriptor: descriptor.clone(),
                status: DeletionStatus::WouldDelete,
                attempts: 0,
                duration_ms: 0,
                batch,
            };
        }

        let attempts = AtomicU32::new(0);
        let call_timeout = self.config.call_timeout;
        let result = (|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            match timeout(call_timeout, self.provider.delete(descriptor)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(call_timeout)),
            }
        })
        .retry(self.config.retry.backoff())
        .when(|e: &ProviderError| e.is_retryable())
        .notify(|e: &ProviderError, delay: Duration| {
            warn!(key = %key, delay = ?delay, error = %e, "Delete failed, retrying...");
        })
        .await;

        let status = match result {
            Ok(()) => {
                info!(key = %key, "Deleted");
                DeletionStatus::Deleted
            }
            Err(ProviderError::NotFound(_)) => {
                debug!(key = %key, "Already deleted");
                DeletionStatus::Deleted
            }
            Err(ProviderError::Protected(reason)) => {
                info!(key = %key, reason = %reason, "Provider refused deletion");
                DeletionStatus::Protected(reason)
            }
            Err(ProviderError::Unsupported(message)) => {
                warn!(key = %key, message = %message, "Deletion not supported");
                DeletionStatus::Skipped(SkipReason::Unsupported)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to delete");
                DeletionStatus::Failed(e.to_string())
            }
        };

        DeletionOutcome {
            descriptor: descriptor.clone(),
            status,
            attempts: attempts.load(Ordering::SeqCst),
            duration_ms: start.elapsed().as_millis() as u64,
            batch,
        }
    }
}
