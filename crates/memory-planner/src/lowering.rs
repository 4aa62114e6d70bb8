//! Lowering filter trees into parameterized backend query text.
//!
//! Backends that can evaluate predicates themselves receive a flat text
//! form with `?` placeholders and a parameter list in placeholder order.
//! Any predicate that cannot be rendered safely is replaced by the
//! always-true `1 = 1`, so a lowered query may over-return but never
//! under-returns; the in-memory post-filter restores exact semantics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use memory_filter::{ComparisonOperator, FilterNode, FilterValue, LogicalOperator};

use crate::selectivity::SelectivityEstimator;

/// Rendered form of the always-true degrade.
const ALWAYS_TRUE: &str = "1 = 1";

/// A filter tree rendered for backend-side evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoweredQuery {
    pub text: String,
    /// Bound values in the order their `?` placeholders appear.
    pub parameters: Vec<FilterValue>,
    pub estimated_cost: f64,
}

impl LoweredQuery {
    /// True when every predicate degraded and the text filters nothing.
    pub fn is_always_true(&self) -> bool {
        self.text == ALWAYS_TRUE && self.parameters.is_empty()
    }
}

/// Renders filter trees into [`LoweredQuery`]s.
pub struct QueryLowering {
    estimator: Arc<SelectivityEstimator>,
}

impl Default for QueryLowering {
    fn default() -> Self {
        Self::new(Arc::new(SelectivityEstimator::new()))
    }
}

impl QueryLowering {
    pub fn new(estimator: Arc<SelectivityEstimator>) -> Self {
        Self { estimator }
    }

    pub fn lower(&self, node: &FilterNode) -> LoweredQuery {
        let mut parameters = Vec::new();
        let text = render(node, &mut parameters);
        LoweredQuery {
            text,
            parameters,
            estimated_cost: self.estimator.cost(node),
        }
    }
}

fn render(node: &FilterNode, parameters: &mut Vec<FilterValue>) -> String {
    match node {
        FilterNode::Comparison {
            field,
            operator,
            value,
        } => render_comparison(field, *operator, value, parameters),
        FilterNode::Logical { operator, children } => match operator {
            LogicalOperator::Not => {
                let child = children
                    .first()
                    .map(|c| render(c, parameters))
                    .unwrap_or_else(|| ALWAYS_TRUE.to_string());
                format!("NOT ({child})")
            }
            LogicalOperator::And | LogicalOperator::Or => {
                let joiner = match operator {
                    LogicalOperator::And => " AND ",
                    _ => " OR ",
                };
                children
                    .iter()
                    .map(|child| format!("({})", render(child, parameters)))
                    .collect::<Vec<_>>()
                    .join(joiner)
            }
        },
        FilterNode::Group { child } => render(child, parameters),
    }
}

fn render_comparison(
    field: &str,
    operator: ComparisonOperator,
    value: &FilterValue,
    parameters: &mut Vec<FilterValue>,
) -> String {
    if !is_safe_field(field) {
        return ALWAYS_TRUE.to_string();
    }

    match operator {
        ComparisonOperator::Eq => bind(parameters, value.clone(), format!("{field} = ?")),
        ComparisonOperator::Ne => bind(parameters, value.clone(), format!("{field} <> ?")),
        ComparisonOperator::Gt => bind(parameters, value.clone(), format!("{field} > ?")),
        ComparisonOperator::Lt => bind(parameters, value.clone(), format!("{field} < ?")),
        ComparisonOperator::Ge => bind(parameters, value.clone(), format!("{field} >= ?")),
        ComparisonOperator::Le => bind(parameters, value.clone(), format!("{field} <= ?")),
        ComparisonOperator::Like => {
            let pattern = value.to_string();
            let pattern = if pattern.contains('%') {
                pattern
            } else {
                format!("%{pattern}%")
            };
            bind(
                parameters,
                FilterValue::String(pattern),
                format!("{field} LIKE ?"),
            )
        }
        ComparisonOperator::Contains => {
            let needle = value.to_string();
            let needle = needle.trim_matches('%');
            bind(
                parameters,
                FilterValue::String(format!("%{needle}%")),
                format!("{field} LIKE ?"),
            )
        }
        ComparisonOperator::In | ComparisonOperator::NotIn => {
            let members = value.as_members();
            if members.is_empty() {
                return ALWAYS_TRUE.to_string();
            }
            let placeholders = vec!["?"; members.len()].join(", ");
            for member in members {
                parameters.push(FilterValue::String(member));
            }
            let keyword = if operator == ComparisonOperator::In {
                "IN"
            } else {
                "NOT IN"
            };
            format!("{field} {keyword} ({placeholders})")
        }
        ComparisonOperator::Between => {
            let members = value.as_members();
            if members.len() != 2 {
                return ALWAYS_TRUE.to_string();
            }
            let bounds: Vec<f64> = members
                .iter()
                .filter_map(|member| member.trim().parse::<f64>().ok())
                .collect();
            let [low, high] = bounds.as_slice() else {
                return ALWAYS_TRUE.to_string();
            };
            parameters.push(FilterValue::Number(*low));
            parameters.push(FilterValue::Number(*high));
            format!("{field} BETWEEN ? AND ?")
        }
    }
}

fn bind(parameters: &mut Vec<FilterValue>, value: FilterValue, text: String) -> String {
    parameters.push(value);
    text
}

/// Fields must look like dotted identifiers before they are spliced into
/// query text verbatim.
fn is_safe_field(field: &str) -> bool {
    let mut chars = field.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    field
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !field.ends_with('.')
        && !field.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_filter::parse;

    fn lower(expression: &str) -> LoweredQuery {
        QueryLowering::default().lower(&parse(expression).unwrap())
    }

    #[test]
    fn equality_renders_a_placeholder() {
        let lowered = lower("status = active");
        assert_eq!(lowered.text, "status = ?");
        assert_eq!(
            lowered.parameters,
            vec![FilterValue::String("active".to_string())]
        );
        assert!(lowered.estimated_cost > 0.0);
    }

    #[test]
    fn inequality_uses_angle_brackets() {
        assert_eq!(lower("status != archived").text, "status <> ?");
    }

    #[test]
    fn contains_wraps_the_needle_in_wildcards() {
        let node = FilterNode::comparison("content", ComparisonOperator::Contains, "milk");
        let lowered = QueryLowering::default().lower(&node);
        assert_eq!(lowered.text, "content LIKE ?");
        assert_eq!(
            lowered.parameters,
            vec![FilterValue::String("%milk%".to_string())]
        );
    }

    #[test]
    fn like_preserves_explicit_wildcards() {
        let lowered = lower("content LIKE 'milk%'");
        assert_eq!(
            lowered.parameters,
            vec![FilterValue::String("milk%".to_string())]
        );
    }

    #[test]
    fn like_without_wildcards_gets_wrapped() {
        let lowered = lower("content LIKE milk");
        assert_eq!(
            lowered.parameters,
            vec![FilterValue::String("%milk%".to_string())]
        );
    }

    #[test]
    fn membership_renders_one_placeholder_per_member() {
        let lowered = lower("kind IN 'a,b,c'");
        assert_eq!(lowered.text, "kind IN (?, ?, ?)");
        assert_eq!(lowered.parameters.len(), 3);
    }

    #[test]
    fn negated_membership_keeps_the_not() {
        assert_eq!(lower("kind NOT IN 'a,b'").text, "kind NOT IN (?, ?)");
    }

    #[test]
    fn between_binds_numeric_bounds() {
        // BETWEEN has no text form; it only arrives via programmatic trees.
        let node = FilterNode::comparison("score", ComparisonOperator::Between, vec!["2", "8"]);
        let lowered = QueryLowering::default().lower(&node);
        assert_eq!(lowered.text, "score BETWEEN ? AND ?");
        assert_eq!(
            lowered.parameters,
            vec![FilterValue::Number(2.0), FilterValue::Number(8.0)]
        );
    }

    #[test]
    fn non_numeric_bounds_degrade_to_always_true() {
        let node =
            FilterNode::comparison("score", ComparisonOperator::Between, vec!["low", "high"]);
        assert!(QueryLowering::default().lower(&node).is_always_true());
    }

    #[test]
    fn logical_children_are_parenthesized() {
        let lowered = lower("a = 1 AND (b = 2 OR c = 3)");
        assert_eq!(lowered.text, "(a = ?) AND ((b = ?) OR (c = ?))");
        assert_eq!(lowered.parameters.len(), 3);
    }

    #[test]
    fn negation_wraps_its_child() {
        assert_eq!(lower("NOT status = archived").text, "NOT (status = ?)");
    }

    #[test]
    fn unsafe_fields_degrade_without_binding() {
        let lowered = lower("123 = 5 AND score > 2");
        assert_eq!(lowered.text, "(1 = 1) AND (score > ?)");
        assert_eq!(lowered.parameters, vec![FilterValue::Number(2.0)]);
    }

    #[test]
    fn fully_degraded_queries_are_flagged() {
        assert!(lower("123 = 5").is_always_true());
    }
}
