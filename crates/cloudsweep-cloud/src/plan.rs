//! Deletion planner
//!
//! Turns a [`ResourceGraph`] into an ordered list of batches. Resources are
//! ordered by rank (highest first), then by kind declaration order, then by
//! id. Explicit edges are hard constraints: the source of an edge always lands
//! in an earlier batch than its target. The output depends only on the input
//! set, so a dry run and a real run plan identically.

use crate::error::{CloudError, Result};
use crate::graph::ResourceGraph;
use crate::resource::{DependencyRank, ResourceDescriptor, ResourceKey};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Resources that can be deleted concurrently
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub resources: Vec<ResourceDescriptor>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Highest rank present in the batch
    pub fn rank(&self) -> Option<DependencyRank> {
        self.resources.iter().map(|r| r.rank()).max()
    }
}

/// Ordered batches covering every discovered resource exactly once
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletionPlan {
    pub batches: Vec<Batch>,
}

impl DeletionPlan {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.iter().all(Batch::is_empty)
    }

    /// Resources in execution order
    pub fn resources(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.batches.iter().flat_map(|b| b.resources.iter())
    }

    /// Batch index holding a resource
    pub fn batch_of(&self, key: &ResourceKey) -> Option<usize> {
        self.batches
            .iter()
            .find(|b| b.resources.iter().any(|r| &r.key() == key))
            .map(|b| b.index)
    }

    /// Keys in execution order, for comparing plans
    pub fn order(&self) -> Vec<Vec<ResourceKey>> {
        self.batches
            .iter()
            .map(|b| b.resources.iter().map(|r| r.key()).collect())
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            batches: self.batches.len(),
            resources: self.len(),
            largest_batch: self.batches.iter().map(Batch::len).max().unwrap_or(0),
        }
    }
}

/// Summary of a plan
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub batches: usize,
    pub resources: usize,
    pub largest_batch: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} resources in {} batches (largest batch: {})",
            self.resources, self.batches, self.largest_batch
        )
    }
}

/// Build the deletion plan for a graph
pub fn plan(graph: &ResourceGraph) -> Result<DeletionPlan> {
    // Stable order: rank desc, kind declaration order, id
    let mut resources: Vec<&ResourceDescriptor> = Vec::with_capacity(graph.resources.len());
    let mut seen = HashSet::new();
    for descriptor in &graph.resources {
        if seen.insert(descriptor.key()) {
            resources.push(descriptor);
        }
    }
    resources.sort_by(|a, b| {
        (Reverse(a.rank()), a.kind.ordinal(), &a.id).cmp(&(Reverse(b.rank()), b.kind.ordinal(), &b.id))
    });

    let position: HashMap<ResourceKey, usize> = resources
        .iter()
        .enumerate()
        .map(|(i, r)| (r.key(), i))
        .collect();

    let mut distinct_ranks: Vec<DependencyRank> = resources.iter().map(|r| r.rank()).collect();
    distinct_ranks.dedup();
    let base_level = |rank: DependencyRank| {
        distinct_ranks
            .iter()
            .position(|r| *r == rank)
            .unwrap_or_default()
    };

    let n = resources.len();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];
    let mut edge_set = HashSet::new();
    for edge in &graph.edges {
        let (Some(&from), Some(&to)) = (position.get(&edge.from), position.get(&edge.to)) else {
            tracing::debug!(from = %edge.from, to = %edge.to, "Edge outside the resource set ignored");
            continue;
        };
        if from == to {
            return Err(CloudError::DependencyCycle(vec![edge.from.to_string()]));
        }
        if edge_set.insert((from, to)) {
            successors[from].push(to);
            predecessors[to].push(from);
            in_degree[to] += 1;
        }
    }

    // Kahn's algorithm; the ready set is ordered by sort position
    let mut level = vec![0usize; n];
    let mut ready: BTreeSet<usize> = (0..n).filter(|i| in_degree[*i] == 0).collect();
    let mut processed = 0usize;
    while let Some(i) = ready.pop_first() {
        processed += 1;
        let constrained = predecessors[i].iter().map(|p| level[*p] + 1).max().unwrap_or(0);
        level[i] = base_level(resources[i].rank()).max(constrained);
        for &s in &successors[i] {
            in_degree[s] -= 1;
            if in_degree[s] == 0 {
                ready.insert(s);
            }
        }
    }

    if processed < n {
        let mut members: Vec<String> = (0..n)
            .filter(|i| in_degree[*i] > 0)
            .map(|i| resources[i].key().to_string())
            .collect();
        members.sort();
        return Err(CloudError::DependencyCycle(members));
    }

    let max_level = level.iter().copied().max().unwrap_or(0);
    let mut buckets: Vec<Vec<ResourceDescriptor>> = vec![Vec::new(); if n == 0 { 0 } else { max_level + 1 }];
    for (i, descriptor) in resources.iter().enumerate() {
        buckets[level[i]].push((*descriptor).clone());
    }

    let batches = buckets
        .into_iter()
        .filter(|b| !b.is_empty())
        .enumerate()
        .map(|(index, resources)| Batch { index, resources })
        .collect();

    Ok(DeletionPlan { batches })
}
