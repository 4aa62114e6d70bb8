//! Choosing between in-memory evaluation and backend pushdown.

use std::sync::Arc;

use tracing::debug;

use memory_filter::FilterNode;

use crate::lowering::{LoweredQuery, QueryLowering};
use crate::selectivity::SelectivityEstimator;

/// Candidate-set size above which pushdown pays off regardless of tree cost.
const PUSHDOWN_CANDIDATE_THRESHOLD: usize = 200;
/// Combined work estimate (tree cost x candidates) above which pushdown wins.
const PUSHDOWN_WORK_THRESHOLD: f64 = 500.0;

/// Where a filter should be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRoute {
    /// Fetch raw records and evaluate the tree locally.
    InMemory,
    /// Hand the rendered query to the persistence collaborator.
    Lowered(LoweredQuery),
}

impl QueryRoute {
    pub fn is_lowered(&self) -> bool {
        matches!(self, QueryRoute::Lowered(_))
    }
}

/// Per-query routing decision based on the estimator's cost model.
pub struct QueryRouter {
    estimator: Arc<SelectivityEstimator>,
    lowering: QueryLowering,
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self::new(Arc::new(SelectivityEstimator::new()))
    }
}

impl QueryRouter {
    pub fn new(estimator: Arc<SelectivityEstimator>) -> Self {
        let lowering = QueryLowering::new(Arc::clone(&estimator));
        Self {
            estimator,
            lowering,
        }
    }

    /// Decide where `node` should run against `candidate_count` records.
    ///
    /// Pushdown requires a backend that supports it, a lowered form that
    /// still filters something, and an input large or expensive enough that
    /// shipping the query beats scanning locally.
    pub fn choose(
        &self,
        node: &FilterNode,
        candidate_count: usize,
        backend_supports_lowering: bool,
    ) -> QueryRoute {
        if !backend_supports_lowering {
            return QueryRoute::InMemory;
        }

        let cost = self.estimator.cost(node);
        let work = cost * candidate_count as f64;
        if candidate_count <= PUSHDOWN_CANDIDATE_THRESHOLD && work <= PUSHDOWN_WORK_THRESHOLD {
            return QueryRoute::InMemory;
        }

        let lowered = self.lowering.lower(node);
        if lowered.is_always_true() {
            // The whole tree degraded; the backend would return everything
            // anyway, so skip the round trip.
            return QueryRoute::InMemory;
        }

        debug!(
            candidates = candidate_count,
            cost, "routing filter to backend pushdown"
        );
        QueryRoute::Lowered(lowered)
    }
}
