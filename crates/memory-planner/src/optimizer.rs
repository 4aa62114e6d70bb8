//! Cost-based reordering of filter trees.

use std::sync::Arc;

use memory_filter::{FilterNode, LogicalOperator};

use crate::selectivity::SelectivityEstimator;

/// Reorders AND-children by descending selectivity.
///
/// The only structural transformation performed. OR and NOT children keep
/// their original order, groups stay in place, and the input tree is never
/// mutated: optimization returns a new tree and leaves the original intact
/// for logging.
pub struct FilterOptimizer {
    estimator: Arc<SelectivityEstimator>,
}

impl FilterOptimizer {
    pub fn new(estimator: Arc<SelectivityEstimator>) -> Self {
        Self { estimator }
    }

    pub fn estimator(&self) -> &Arc<SelectivityEstimator> {
        &self.estimator
    }

    /// Produce a reordered copy of `node`.
    ///
    /// Evaluation semantics are preserved exactly; only the order in which
    /// AND-children are visited changes. The sort is stable, so children
    /// with equal selectivity keep their relative order and optimizing an
    /// already-optimized tree is a no-op.
    pub fn optimize(&self, node: &FilterNode) -> FilterNode {
        match node {
            FilterNode::Comparison { .. } => node.clone(),
            FilterNode::Group { child } => FilterNode::group(self.optimize(child)),
            FilterNode::Logical { operator, children } => {
                let mut optimized: Vec<FilterNode> =
                    children.iter().map(|c| self.optimize(c)).collect();
                if *operator == LogicalOperator::And {
                    let mut scored: Vec<(f64, FilterNode)> = optimized
                        .drain(..)
                        .map(|c| (self.estimator.selectivity(&c), c))
                        .collect();
                    scored.sort_by(|a, b| {
                        b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal)
                    });
                    optimized = scored.into_iter().map(|(_, c)| c).collect();
                }
                FilterNode::Logical {
                    operator: *operator,
                    children: optimized,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_filter::{filter_documents, parse};
    use serde_json::{json, Value};

    fn optimizer() -> FilterOptimizer {
        FilterOptimizer::new(Arc::new(SelectivityEstimator::new()))
    }

    fn first_field(node: &FilterNode) -> &str {
        match node {
            FilterNode::Logical { children, .. } => first_field(&children[0]),
            FilterNode::Comparison { field, .. } => field,
            FilterNode::Group { child } => first_field(child),
        }
    }

    #[test]
    fn and_children_are_ordered_by_descending_selectivity() {
        // status != x estimates 0.9, content ~ ... caps at 0.3.
        let tree = parse("content ~ milk AND status != archived").unwrap();
        let optimized = optimizer().optimize(&tree);
        assert_eq!(first_field(&optimized), "status");
    }

    #[test]
    fn or_children_keep_their_original_order() {
        let tree = parse("content ~ milk OR status != archived").unwrap();
        let optimized = optimizer().optimize(&tree);
        assert_eq!(first_field(&optimized), "content");
    }

    #[test]
    fn optimization_never_changes_the_result_set() {
        let docs: Vec<Value> = (0..30)
            .map(|i| {
                json!({
                    "id": i,
                    "status": if i % 3 == 0 { "active" } else { "archived" },
                    "content": if i % 2 == 0 { "drink milk" } else { "write code" },
                    "score": i,
                })
            })
            .collect();

        let opt = optimizer();
        for expression in [
            "content ~ milk AND status != archived",
            "score > 10 AND content ~ code AND status = active",
            "NOT status = active AND score <= 20",
            "(content ~ milk OR score > 25) AND status = archived",
        ] {
            let tree = parse(expression).unwrap();
            let optimized = opt.optimize(&tree);
            let before: Vec<&Value> = filter_documents(&tree, &docs);
            let after: Vec<&Value> = filter_documents(&optimized, &docs);
            assert_eq!(before, after, "{expression}");
        }
    }

    #[test]
    fn optimization_is_idempotent() {
        let tree = parse("content ~ milk AND status != archived AND score > 3").unwrap();
        let opt = optimizer();
        let once = opt.optimize(&tree);
        let twice = opt.optimize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn the_original_tree_is_left_untouched() {
        let tree = parse("content ~ milk AND status != archived").unwrap();
        let rendering = tree.to_string();
        let _optimized = optimizer().optimize(&tree);
        assert_eq!(tree.to_string(), rendering);
    }

    #[test]
    fn nested_and_under_or_is_also_reordered() {
        let tree = parse("a = 1 OR (content ~ milk AND status != archived)").unwrap();
        let optimized = optimizer().optimize(&tree);
        let FilterNode::Logical { children, .. } = &optimized else {
            panic!("expected logical root");
        };
        assert_eq!(first_field(&children[1]), "status");
    }
}
