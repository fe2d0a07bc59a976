//! Per-resource outcomes and the run report

use crate::graph::DiscoveryWarning;
use crate::resource::{Provider, ResourceDescriptor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a resource was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The run was cancelled before the resource was dispatched
    Cancelled,
    /// The adapter cannot delete this kind
    Unsupported,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Cancelled => write!(f, "cancelled"),
            SkipReason::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Terminal status of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum DeletionStatus {
    Deleted,
    /// Dry-run preview of a deletion
    WouldDelete,
    Skipped(SkipReason),
    Failed(String),
    Protected(String),
}

impl DeletionStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, DeletionStatus::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeletionStatus::Deleted => "deleted",
            DeletionStatus::WouldDelete => "would-delete",
            DeletionStatus::Skipped(_) => "skipped",
            DeletionStatus::Failed(_) => "failed",
            DeletionStatus::Protected(_) => "protected",
        }
    }
}

impl std::fmt::Display for DeletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeletionStatus::Skipped(reason) => write!(f, "skipped ({})", reason),
            DeletionStatus::Failed(error) => write!(f, "failed: {}", error),
            DeletionStatus::Protected(reason) => write!(f, "protected ({})", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionOutcome {
    pub descriptor: ResourceDescriptor,

    pub status: DeletionStatus,

    /// Delete calls issued, retries included
    pub attempts: u32,

    /// Wall time spent on the resource in milliseconds
    pub duration_ms: u64,

    /// Batch the resource was planned in
    pub batch: usize,
}

/// Result of a sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub provider: Provider,
    pub scope_id: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Outcomes in plan order
    pub outcomes: Vec<DeletionOutcome>,

    /// Kinds whose discovery degraded to an empty result
    pub discovery_warnings: Vec<DiscoveryWarning>,
}

impl RunReport {
    pub fn new(provider: Provider, scope_id: impl Into<String>, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            provider,
            scope_id: scope_id.into(),
            dry_run,
            started_at: now,
            finished_at: now,
            outcomes: Vec::new(),
            discovery_warnings: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: DeletionOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.status.is_failed())
    }

    /// Whether every resource reached a non-failed status
    pub fn is_success(&self) -> bool {
        !self.has_failures()
    }

    /// Process exit code: 1 if anything failed; dry runs always succeed
    pub fn exit_code(&self) -> u8 {
        if !self.dry_run && self.has_failures() { 1 } else { 0 }
    }

    pub fn failures(&self) -> Vec<&DeletionOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failed()).collect()
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for outcome in &self.outcomes {
            match outcome.status {
                DeletionStatus::Deleted => summary.deleted += 1,
                DeletionStatus::WouldDelete => summary.would_delete += 1,
                DeletionStatus::Skipped(_) => summary.skipped += 1,
                DeletionStatus::Failed(_) => summary.failed += 1,
                DeletionStatus::Protected(_) => summary.protected += 1,
            }
        }
        summary
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// Count of outcomes per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub deleted: usize,
    pub would_delete: usize,
    pub skipped: usize,
    pub failed: usize,
    pub protected: usize,
}

impl ReportSummary {
    pub fn total(&self) -> usize {
        self.deleted + self.would_delete + self.skipped + self.failed + self.protected
    }
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} deleted, {} would delete, {} skipped, {} protected, {} failed",
            self.deleted, self.would_delete, self.skipped, self.protected, self.failed
        )
    }
}
