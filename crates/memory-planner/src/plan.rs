//! Execution plans derived from optimized filter trees.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use memory_filter::FilterNode;

use crate::optimizer::FilterOptimizer;
use crate::selectivity::SelectivityEstimator;

/// Derived per-query plan. Never persisted, recomputed on each use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Stages in evaluation order. For an AND root these are its children
    /// sorted by descending selectivity; any other root is a single stage.
    pub execution_order: Vec<FilterNode>,
    /// Indices of stages that could run concurrently. Leaf comparisons are
    /// mutually independent and share a group; each nested logical stage
    /// stands alone.
    pub parallel_groups: Vec<Vec<usize>>,
    pub estimated_total_cost: f64,
    /// Stage indices after which a shrink check is worthwhile (selective
    /// stages, all but the last).
    pub early_termination_points: Vec<usize>,
    /// Fields referenced by more than one comparison; repeated lookups on
    /// these are worth caching per document.
    pub cache_opportunities: Vec<String>,
}

impl ExecutionPlan {
    pub fn stage_count(&self) -> usize {
        self.execution_order.len()
    }
}

/// Builds [`ExecutionPlan`]s from raw filter trees.
pub struct QueryPlanner {
    estimator: Arc<SelectivityEstimator>,
    optimizer: FilterOptimizer,
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::new(Arc::new(SelectivityEstimator::new()))
    }
}

impl QueryPlanner {
    pub fn new(estimator: Arc<SelectivityEstimator>) -> Self {
        let optimizer = FilterOptimizer::new(Arc::clone(&estimator));
        Self {
            estimator,
            optimizer,
        }
    }

    pub fn estimator(&self) -> &Arc<SelectivityEstimator> {
        &self.estimator
    }

    pub fn optimizer(&self) -> &FilterOptimizer {
        &self.optimizer
    }

    /// Optimize `node` and derive its execution plan.
    pub fn plan(&self, node: &FilterNode) -> ExecutionPlan {
        let optimized = self.optimizer.optimize(node);
        let stages: Vec<FilterNode> = match optimized.unwrap_groups() {
            FilterNode::Logical {
                operator: memory_filter::LogicalOperator::And,
                children,
            } => children.clone(),
            other => vec![other.clone()],
        };

        let estimated_total_cost = stages.iter().map(|s| self.estimator.cost(s)).sum();
        let parallel_groups = parallel_groups(&stages);
        let early_termination_points = self.termination_points(&stages);
        let cache_opportunities = repeated_fields(&optimized);

        ExecutionPlan {
            execution_order: stages,
            parallel_groups,
            estimated_total_cost,
            early_termination_points,
            cache_opportunities,
        }
    }

    fn termination_points(&self, stages: &[FilterNode]) -> Vec<usize> {
        if stages.len() < 2 {
            return Vec::new();
        }
        stages[..stages.len() - 1]
            .iter()
            .enumerate()
            .filter(|(_, stage)| self.estimator.selectivity(stage) >= 0.5)
            .map(|(index, _)| index)
            .collect()
    }
}

/// Group adjacent leaf comparisons together; nested logical stages run
/// alone.
fn parallel_groups(stages: &[FilterNode]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    for (index, stage) in stages.iter().enumerate() {
        if matches!(stage.unwrap_groups(), FilterNode::Comparison { .. }) {
            current.push(index);
        } else {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            groups.push(vec![index]);
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Fields used by two or more comparisons anywhere in the tree.
fn repeated_fields(node: &FilterNode) -> Vec<String> {
    fn collect(node: &FilterNode, seen: &mut Vec<String>) {
        match node {
            FilterNode::Comparison { field, .. } => seen.push(field.clone()),
            FilterNode::Logical { children, .. } => {
                for child in children {
                    collect(child, seen);
                }
            }
            FilterNode::Group { child } => collect(child, seen),
        }
    }

    let mut fields = Vec::new();
    collect(node, &mut fields);
    let mut repeated = BTreeSet::new();
    for (i, field) in fields.iter().enumerate() {
        if fields[..i].contains(field) {
            repeated.insert(field.clone());
        }
    }
    repeated.into_iter().collect()
}
