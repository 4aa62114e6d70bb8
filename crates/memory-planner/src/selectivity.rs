//! Selectivity and cost estimation for filter nodes.
//!
//! Selectivity runs from 0 (matches everything) to 1 (matches almost
//! nothing). Higher-selectivity predicates are cheaper to run first inside
//! a conjunction because they shrink the candidate set fastest. The model
//! is heuristic: operator class sets a base score, the value's shape and
//! the field's name adjust it.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use memory_filter::{ComparisonOperator, FilterNode, FilterValue, LogicalOperator, OperatorCategory};

/// Default entry bound for the estimate cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Cached estimate for one comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectivityInfo {
    /// Cache key derived from `(field, operator, value, value type)`.
    pub fingerprint: String,
    /// Estimated selectivity in `[0, 1]`.
    pub selectivity: f64,
    /// Relative evaluation cost of the predicate.
    pub cost: f64,
    pub category: OperatorCategory,
}

/// Field names that suggest a near-unique identifier.
const IDENTIFIER_MARKERS: &[&str] = &["id", "uuid", "guid", "key", "hash", "fingerprint"];

/// Field names that suggest free text, where most predicates match often.
const CONTENT_MARKERS: &[&str] = &[
    "content",
    "text",
    "body",
    "description",
    "summary",
    "message",
    "note",
];

/// Shared estimator with a FIFO-bounded comparison cache.
///
/// The cache is keyed per comparison, not per tree, so repeated predicates
/// across queries hit it. Eviction is insertion-ordered: when the bound is
/// reached the oldest entry goes first.
pub struct SelectivityEstimator {
    cache: Mutex<FifoCache>,
}

struct FifoCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, SelectivityInfo>,
}

impl FifoCache {
    fn get(&self, key: &str) -> Option<SelectivityInfo> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, info: SelectivityInfo) {
        if self.entries.contains_key(&info.fingerprint) {
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(info.fingerprint.clone());
        self.entries.insert(info.fingerprint.clone(), info);
    }
}

impl Default for SelectivityEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectivityEstimator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(FifoCache {
                capacity: capacity.max(1),
                order: VecDeque::new(),
                entries: HashMap::new(),
            }),
        }
    }

    /// Estimated selectivity of a whole tree.
    ///
    /// AND takes the maximum of its children (the most selective child
    /// dominates the intersection), OR the minimum, NOT the complement.
    pub fn selectivity(&self, node: &FilterNode) -> f64 {
        match node {
            FilterNode::Comparison { .. } => self.comparison_info(node).selectivity,
            FilterNode::Group { child } => self.selectivity(child),
            FilterNode::Logical { operator, children } => {
                let scores = children.iter().map(|c| self.selectivity(c));
                let combined = match operator {
                    LogicalOperator::And => scores.fold(0.0_f64, f64::max),
                    LogicalOperator::Or => scores.fold(1.0_f64, f64::min),
                    LogicalOperator::Not => {
                        1.0 - children.first().map_or(0.0, |c| self.selectivity(c))
                    }
                };
                combined.clamp(0.0, 1.0)
            }
        }
    }

    /// Estimated relative evaluation cost of a tree.
    pub fn cost(&self, node: &FilterNode) -> f64 {
        match node {
            FilterNode::Comparison { .. } => self.comparison_info(node).cost,
            FilterNode::Group { child } => self.cost(child),
            FilterNode::Logical { children, .. } => {
                0.1 + children.iter().map(|c| self.cost(c)).sum::<f64>()
            }
        }
    }

    /// Cached estimate for a single comparison node.
    ///
    /// Non-comparison nodes get a synthetic uncached entry so callers can
    /// treat the result uniformly.
    pub fn comparison_info(&self, node: &FilterNode) -> SelectivityInfo {
        let FilterNode::Comparison {
            field,
            operator,
            value,
        } = node
        else {
            return SelectivityInfo {
                fingerprint: String::new(),
                selectivity: self.selectivity(node),
                cost: self.cost(node),
                category: OperatorCategory::Equality,
            };
        };

        let fingerprint = fingerprint(field, *operator, value);
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = cache.get(&fingerprint) {
                return hit;
            }
        }

        let info = SelectivityInfo {
            selectivity: estimate_comparison(field, *operator, value),
            cost: comparison_cost(*operator, value),
            category: operator.category(),
            fingerprint,
        };
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(info.clone());
        info
    }

    /// Whether a comparison currently has a cached estimate.
    pub fn is_cached(&self, node: &FilterNode) -> bool {
        let FilterNode::Comparison {
            field,
            operator,
            value,
        } = node
        else {
            return false;
        };
        let key = fingerprint(field, *operator, value);
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.entries.contains_key(&key)
    }

    pub fn cache_len(&self) -> usize {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.entries.len()
    }
}

/// Cache key for one comparison.
pub fn fingerprint(field: &str, operator: ComparisonOperator, value: &FilterValue) -> String {
    format!(
        "{field}|{}|{}|{}",
        operator.as_str(),
        value,
        value.type_name()
    )
}

fn estimate_comparison(field: &str, operator: ComparisonOperator, value: &FilterValue) -> f64 {
    let base = match operator {
        ComparisonOperator::Eq => equality_base(value),
        ComparisonOperator::Ne => 0.9,
        ComparisonOperator::Gt => 0.55,
        ComparisonOperator::Ge => 0.5,
        ComparisonOperator::Lt => 0.5,
        ComparisonOperator::Le => 0.45,
        ComparisonOperator::Like => pattern_base(value),
        ComparisonOperator::Contains => 0.2,
        ComparisonOperator::In | ComparisonOperator::NotIn => membership_base(value),
        ComparisonOperator::Between => 0.7,
    };
    adjust_for_field(field, base).clamp(0.0, 1.0)
}

/// Equality baseline 0.8, boosted when the value shape suggests precision.
fn equality_base(value: &FilterValue) -> f64 {
    match value {
        FilterValue::Number(_) => 0.85,
        FilterValue::String(s) if s.len() > 20 => 0.85,
        _ => 0.8,
    }
}

/// Pattern selectivity by wildcard shape: substring scans match broadly,
/// anchored prefixes much less so.
fn pattern_base(value: &FilterValue) -> f64 {
    let FilterValue::String(s) = value else {
        return 0.2;
    };
    let leading = s.starts_with('%');
    let trailing = s.ends_with('%') && s.len() > 1;
    match (leading, trailing) {
        (true, true) => 0.2,
        (true, false) => 0.4,
        (false, true) => 0.6,
        (false, false) => 0.7,
    }
}

/// Membership grows less selective with every candidate in the set.
fn membership_base(value: &FilterValue) -> f64 {
    let size = value.as_members().len() as f64;
    (0.9 - 0.1 * size).clamp(0.2, 0.8)
}

/// Field-name heuristics: identifier-ish fields pull the score toward
/// 0.9, free-text fields cap it at 0.3.
fn adjust_for_field(field: &str, base: f64) -> f64 {
    let lower = field.to_lowercase();
    let leaf = lower.rsplit('.').next().unwrap_or(&lower);
    if IDENTIFIER_MARKERS
        .iter()
        .any(|marker| leaf == *marker || leaf.ends_with(&format!("_{marker}")))
    {
        return base + (0.9 - base) * 0.5;
    }
    if CONTENT_MARKERS.iter().any(|marker| leaf.contains(marker)) {
        return base.min(0.3);
    }
    base
}

fn comparison_cost(operator: ComparisonOperator, value: &FilterValue) -> f64 {
    match operator.category() {
        OperatorCategory::Equality | OperatorCategory::Inequality => 1.0,
        OperatorCategory::Range => 1.2,
        OperatorCategory::Pattern => 2.5,
        OperatorCategory::Membership => 1.5 + 0.1 * value.as_members().len() as f64,
    }
}
