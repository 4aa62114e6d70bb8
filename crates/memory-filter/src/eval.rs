//! Pure evaluation of filter trees over JSON documents.

use serde_json::Value;

use crate::ast::{ComparisonOperator, FilterNode, LogicalOperator};
use crate::value::FilterValue;

/// Evaluate `node` against one document.
///
/// Pure function: the same tree and document always yield the same boolean.
/// AND short-circuits on the first false child, OR on the first true child,
/// groups are transparent.
pub fn evaluate(node: &FilterNode, document: &Value) -> bool {
    match node {
        FilterNode::Comparison {
            field,
            operator,
            value,
        } => evaluate_comparison(document, field, *operator, value),
        FilterNode::Logical { operator, children } => match operator {
            LogicalOperator::And => children.iter().all(|child| evaluate(child, document)),
            LogicalOperator::Or => children.iter().any(|child| evaluate(child, document)),
            LogicalOperator::Not => children
                .first()
                .map_or(true, |child| !evaluate(child, document)),
        },
        FilterNode::Group { child } => evaluate(child, document),
    }
}

/// Filter a document slice, preserving input order.
pub fn filter_documents<'a>(node: &FilterNode, documents: &'a [Value]) -> Vec<&'a Value> {
    documents
        .iter()
        .filter(|doc| evaluate(node, doc))
        .collect()
}

/// Dotted-path lookup. An exact top-level key wins over path descent, so a
/// literal `"a.b"` key is still addressable.
pub fn lookup_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(direct) = document.as_object().and_then(|obj| obj.get(path)) {
        return Some(direct);
    }
    let mut current = document;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn evaluate_comparison(
    document: &Value,
    field: &str,
    operator: ComparisonOperator,
    expected: &FilterValue,
) -> bool {
    let actual = match lookup_path(document, field) {
        Some(value) if !value.is_null() => value,
        // Missing or null fields satisfy only the negative operators.
        _ => {
            return matches!(
                operator,
                ComparisonOperator::Ne | ComparisonOperator::NotIn
            )
        }
    };

    match operator {
        ComparisonOperator::Eq => values_equal(actual, expected),
        ComparisonOperator::Ne => !values_equal(actual, expected),
        ComparisonOperator::Gt => compare_numeric(actual, expected, |ord| ord > 0.0),
        ComparisonOperator::Lt => compare_numeric(actual, expected, |ord| ord < 0.0),
        ComparisonOperator::Ge => compare_numeric(actual, expected, |ord| ord >= 0.0),
        ComparisonOperator::Le => compare_numeric(actual, expected, |ord| ord <= 0.0),
        ComparisonOperator::Like | ComparisonOperator::Contains => {
            substring_match(actual, expected)
        }
        ComparisonOperator::In => is_member(actual, expected),
        ComparisonOperator::NotIn => !is_member(actual, expected),
        ComparisonOperator::Between => between(actual, expected),
    }
}

/// Structural equality. Types must match; numbers compare as f64.
fn values_equal(actual: &Value, expected: &FilterValue) -> bool {
    match expected {
        FilterValue::String(s) => actual.as_str() == Some(s.as_str()),
        FilterValue::Number(n) => actual.as_f64() == Some(*n),
        FilterValue::Bool(b) => actual.as_bool() == Some(*b),
        FilterValue::StringArray(items) => match actual.as_array() {
            Some(elements) => {
                elements.len() == items.len()
                    && elements
                        .iter()
                        .zip(items)
                        .all(|(element, item)| scalar_string(element).as_deref() == Some(item))
            }
            None => false,
        },
    }
}

/// String form of a scalar document value. Objects and arrays have none.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn document_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Numeric comparison via coercion of both sides; incomparable values
/// never match.
fn compare_numeric(actual: &Value, expected: &FilterValue, accept: fn(f64) -> bool) -> bool {
    match (document_number(actual), expected.as_f64()) {
        (Some(a), Some(b)) => accept(a - b),
        _ => false,
    }
}

/// Case-insensitive substring containment. Leading/trailing `%` wildcards
/// in the pattern are treated as redundant and stripped.
fn substring_match(actual: &Value, expected: &FilterValue) -> bool {
    let Some(haystack) = scalar_string(actual) else {
        return false;
    };
    let needle = expected.to_string();
    let needle = needle.trim_matches('%');
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Membership through string forms. Array-valued fields match when any
/// element is a member.
fn is_member(actual: &Value, expected: &FilterValue) -> bool {
    let members = expected.as_members();
    match actual.as_array() {
        Some(elements) => elements
            .iter()
            .filter_map(scalar_string)
            .any(|element| members.contains(&element)),
        None => scalar_string(actual)
            .map(|element| members.contains(&element))
            .unwrap_or(false),
    }
}

/// Inclusive numeric range over a two-element bound list.
fn between(actual: &Value, expected: &FilterValue) -> bool {
    let bounds = expected.as_members();
    if bounds.len() != 2 {
        return false;
    }
    let (Ok(low), Ok(high)) = (bounds[0].parse::<f64>(), bounds[1].parse::<f64>()) else {
        return false;
    };
    match document_number(actual) {
        Some(a) => a >= low && a <= high,
        None => false,
    }
}
