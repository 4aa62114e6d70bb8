//! # memory-planner
//!
//! Cost-based planning for filter trees.
//!
//! This crate takes parsed filter trees from `memory-filter` and decides
//! how to run them: estimating per-predicate selectivity, reordering AND
//! children so the most selective run first, deriving staged execution
//! plans with early-termination points, and lowering trees into
//! parameterized backend query text when pushdown beats a local scan.
//!
//! ## Core Concepts
//!
//! - **SelectivityEstimator**: Heuristic scores in `[0, 1]` with a
//!   FIFO-bounded cache shared across queries
//! - **FilterOptimizer**: Result-preserving AND reordering by descending
//!   selectivity
//! - **ExecutionPlan**: Ordered stages, parallel groups, termination points
//! - **PlanExecutor**: Staged evaluation that may stop on a shrunken
//!   survivor set
//! - **QueryLowering**: `?`-parameterized text with an always-true degrade
//! - **QueryRouter**: In-memory vs pushdown decision per candidate set
//!
//! ## Usage
//!
//! ```rust
//! use memory_filter::parse;
//! use memory_planner::{PlanExecutor, QueryPlanner};
//! use serde_json::json;
//!
//! let tree = parse("content ~ milk AND status != archived").unwrap();
//! let plan = QueryPlanner::default().plan(&tree);
//! let documents = vec![json!({"status": "active", "content": "milk run"})];
//! let survivors = PlanExecutor::new().execute(&plan, &documents);
//! assert_eq!(survivors, vec![0]);
//! ```
//!
//! ## Modules
//!
//! - [`selectivity`]: Estimator, cache, field-name heuristics
//! - [`optimizer`]: AND-reordering tree rewrite
//! - [`plan`]: Plan derivation from optimized trees
//! - [`executor`]: Staged plan execution with early termination
//! - [`lowering`]: Parameterized backend query rendering
//! - [`route`]: Pushdown routing decisions

pub mod executor;
pub mod lowering;
pub mod optimizer;
pub mod plan;
pub mod route;
pub mod selectivity;

pub use executor::PlanExecutor;
pub use lowering::{LoweredQuery, QueryLowering};
pub use optimizer::FilterOptimizer;
pub use plan::{ExecutionPlan, QueryPlanner};
pub use route::{QueryRoute, QueryRouter};
pub use selectivity::{SelectivityEstimator, SelectivityInfo, DEFAULT_CACHE_CAPACITY};

pub mod prelude {
    pub use crate::executor::PlanExecutor;
    pub use crate::lowering::{LoweredQuery, QueryLowering};
    pub use crate::optimizer::FilterOptimizer;
    pub use crate::plan::{ExecutionPlan, QueryPlanner};
    pub use crate::route::{QueryRoute, QueryRouter};
    pub use crate::selectivity::SelectivityEstimator;
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use memory_filter::{evaluate, parse};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn corpus() -> Vec<Value> {
        (0..150)
            .map(|index| {
                json!({
                    "user_id": index,
                    "status": if index % 3 == 0 { "active" } else { "archived" },
                    "content": format!("note {index} about groceries"),
                })
            })
            .collect()
    }

    #[test]
    fn shared_estimator_flows_through_planner_and_router() {
        let estimator = Arc::new(SelectivityEstimator::new());
        let planner = QueryPlanner::new(Arc::clone(&estimator));
        let router = QueryRouter::new(Arc::clone(&estimator));

        let tree = parse("status = active AND content ~ groceries").unwrap();
        let plan = planner.plan(&tree);
        assert_eq!(plan.stage_count(), 2);
        // Both predicates were estimated while planning.
        assert_eq!(estimator.cache_len(), 2);

        let route = router.choose(&tree, 1_000, true);
        assert!(route.is_lowered());
    }

    #[test]
    fn optimized_execution_matches_direct_evaluation_on_full_runs() {
        let documents = corpus();
        // No early termination triggers: the survivor set stays above the
        // floor. Plan output must equal direct evaluation exactly.
        let tree = parse("status = active AND content ~ groceries").unwrap();
        let plan = QueryPlanner::default().plan(&tree);
        let planned = PlanExecutor::new().execute(&plan, &documents);
        let direct: Vec<usize> = (0..documents.len())
            .filter(|&index| evaluate(&tree, &documents[index]))
            .collect();
        assert_eq!(planned, direct);
        assert_eq!(planned.len(), 50);
    }

    #[test]
    fn early_termination_returns_a_superset_on_large_inputs() {
        let mut documents = corpus();
        for (index, document) in documents.iter_mut().enumerate() {
            document["status"] = json!(if index < 4 { "flagged" } else { "archived" });
        }

        let expression = "status = flagged AND content ~ 'note 2'";
        let tree = parse(expression).unwrap();
        let plan = QueryPlanner::default().plan(&tree);
        let survivors = PlanExecutor::new().execute(&plan, &documents);

        // The flagged stage runs first and leaves 4 survivors, below the
        // floor, so the content stage never runs.
        assert_eq!(survivors, vec![0, 1, 2, 3]);
        let exact: Vec<usize> = (0..documents.len())
            .filter(|&index| evaluate(&tree, &documents[index]))
            .collect();
        assert!(exact.iter().all(|index| survivors.contains(index)));
        assert_eq!(exact, vec![2]);
    }
}
