//! Fluent construction of filter trees.

use crate::ast::{ComparisonOperator, FilterNode};
use crate::error::FilterError;
use crate::value::FilterValue;

/// Collects predicates for one logical node.
///
/// Strategies assemble structured filters through this builder instead of
/// rendering DSL text and re-parsing it.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    children: Vec<FilterNode>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, node: FilterNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn compare(
        self,
        field: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.push(FilterNode::comparison(field, operator, value))
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.compare(field, ComparisonOperator::Eq, value)
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.compare(field, ComparisonOperator::Ne, value)
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.compare(field, ComparisonOperator::Gt, value)
    }

    pub fn ge(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.compare(field, ComparisonOperator::Ge, value)
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.compare(field, ComparisonOperator::Lt, value)
    }

    pub fn le(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.compare(field, ComparisonOperator::Le, value)
    }

    pub fn like(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.compare(field, ComparisonOperator::Like, value)
    }

    pub fn contains(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.compare(field, ComparisonOperator::Contains, value)
    }

    pub fn in_list(self, field: impl Into<String>, values: Vec<String>) -> Self {
        self.compare(field, ComparisonOperator::In, FilterValue::StringArray(values))
    }

    pub fn not_in(self, field: impl Into<String>, values: Vec<String>) -> Self {
        self.compare(
            field,
            ComparisonOperator::NotIn,
            FilterValue::StringArray(values),
        )
    }

    /// Inclusive numeric range.
    pub fn between(self, field: impl Into<String>, low: f64, high: f64) -> Self {
        let bounds = vec![
            FilterValue::Number(low).to_string(),
            FilterValue::Number(high).to_string(),
        ];
        self.compare(
            field,
            ComparisonOperator::Between,
            FilterValue::StringArray(bounds),
        )
    }

    pub fn negate_last(mut self) -> Self {
        if let Some(last) = self.children.pop() {
            self.children.push(FilterNode::negate(last));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Conjunction of everything pushed. A single predicate comes back
    /// unwrapped; an empty builder is an error.
    pub fn build_and(self) -> Result<FilterNode, FilterError> {
        Self::build(self.children, FilterNode::and)
    }

    /// Disjunction of everything pushed, same single/empty handling as
    /// [`build_and`](Self::build_and).
    pub fn build_or(self) -> Result<FilterNode, FilterError> {
        Self::build(self.children, FilterNode::or)
    }

    fn build(
        mut children: Vec<FilterNode>,
        join: fn(Vec<FilterNode>) -> Result<FilterNode, FilterError>,
    ) -> Result<FilterNode, FilterError> {
        match children.len() {
            0 => Err(FilterError::validation("filter builder has no predicates")),
            1 => Ok(children.remove(0)),
            _ => join(children),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::evaluate;
    use serde_json::json;

    #[test]
    fn single_predicate_builds_unwrapped() {
        let node = FilterBuilder::new().eq("status", "active").build_and().unwrap();
        assert!(matches!(node, FilterNode::Comparison { .. }));
    }

    #[test]
    fn empty_builder_is_an_error() {
        assert!(FilterBuilder::new().build_and().is_err());
        assert!(FilterBuilder::new().build_or().is_err());
    }

    #[test]
    fn chained_predicates_conjoin() {
        let node = FilterBuilder::new()
            .eq("importance", "high")
            .gt("confidenceScore", 0.8)
            .build_and()
            .unwrap();

        assert!(evaluate(
            &node,
            &json!({"importance": "high", "confidenceScore": 0.9})
        ));
        assert!(!evaluate(
            &node,
            &json!({"importance": "high", "confidenceScore": 0.5})
        ));
    }

    #[test]
    fn between_renders_whole_bounds() {
        let node = FilterBuilder::new().between("score", 2.0, 8.0).build_and().unwrap();
        assert!(evaluate(&node, &json!({"score": 8})));
        assert!(!evaluate(&node, &json!({"score": 8.5})));
    }

    #[test]
    fn negate_last_wraps_the_most_recent_predicate() {
        let node = FilterBuilder::new()
            .eq("a", 1i64)
            .eq("b", 2i64)
            .negate_last()
            .build_and()
            .unwrap();
        assert!(evaluate(&node, &json!({"a": 1, "b": 3})));
        assert!(!evaluate(&node, &json!({"a": 1, "b": 2})));
    }
}
