//! Filter tree nodes and structural invariants.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;
use crate::value::FilterValue;

/// Comparison operators accepted by the expression DSL and the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    /// Case-insensitive substring match (`~`, `~~`, `LIKE`).
    Like,
    /// Substring match under its builder spelling. Same semantics as
    /// [`Like`](Self::Like); not a DSL keyword.
    Contains,
    In,
    NotIn,
    /// Inclusive range over a two-element list. Builder-only.
    Between,
}

impl ComparisonOperator {
    /// Resolve an operator token. Symbolic spellings are exact, word
    /// spellings case-insensitive.
    pub fn from_token(text: &str) -> Option<ComparisonOperator> {
        match text {
            "=" | "==" => return Some(ComparisonOperator::Eq),
            "!=" | "<>" => return Some(ComparisonOperator::Ne),
            ">" => return Some(ComparisonOperator::Gt),
            "<" => return Some(ComparisonOperator::Lt),
            ">=" => return Some(ComparisonOperator::Ge),
            "<=" => return Some(ComparisonOperator::Le),
            "~" | "~~" => return Some(ComparisonOperator::Like),
            _ => {}
        }
        if text.eq_ignore_ascii_case("LIKE") {
            Some(ComparisonOperator::Like)
        } else if text.eq_ignore_ascii_case("IN") {
            Some(ComparisonOperator::In)
        } else if text.eq_ignore_ascii_case("NOT IN") {
            Some(ComparisonOperator::NotIn)
        } else {
            None
        }
    }

    /// Canonical rendering.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Ne => "!=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Ge => ">=",
            ComparisonOperator::Le => "<=",
            ComparisonOperator::Like => "LIKE",
            ComparisonOperator::Contains => "CONTAINS",
            ComparisonOperator::In => "IN",
            ComparisonOperator::NotIn => "NOT IN",
            ComparisonOperator::Between => "BETWEEN",
        }
    }

    /// Coarse class used by the selectivity model.
    pub fn category(&self) -> OperatorCategory {
        match self {
            ComparisonOperator::Eq => OperatorCategory::Equality,
            ComparisonOperator::Ne => OperatorCategory::Inequality,
            ComparisonOperator::Gt
            | ComparisonOperator::Lt
            | ComparisonOperator::Ge
            | ComparisonOperator::Le
            | ComparisonOperator::Between => OperatorCategory::Range,
            ComparisonOperator::Like | ComparisonOperator::Contains => OperatorCategory::Pattern,
            ComparisonOperator::In | ComparisonOperator::NotIn => OperatorCategory::Membership,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator families with distinct selectivity behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorCategory {
    Equality,
    Inequality,
    Range,
    Pattern,
    Membership,
}

/// Logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
            LogicalOperator::Not => "NOT",
        }
    }

    /// Binding strength: NOT > AND > OR. Parentheses reset to zero.
    pub fn precedence(&self) -> u8 {
        match self {
            LogicalOperator::Not => 4,
            LogicalOperator::And => 3,
            LogicalOperator::Or => 2,
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural bounds enforced on parsed and built trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterLimits {
    /// Maximum nesting depth, groups included.
    pub max_depth: usize,
    /// Maximum children of one AND/OR node after flattening.
    pub max_children: usize,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_children: 32,
        }
    }
}

/// One node of a filter tree.
///
/// Trees are immutable once built. The optimizer produces reordered copies
/// instead of mutating in place, so the original stays available for
/// logging and audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum FilterNode {
    /// Leaf predicate over a single (possibly dotted) field.
    Comparison {
        field: String,
        operator: ComparisonOperator,
        value: FilterValue,
    },
    /// AND/OR over two or more children, or NOT over exactly one.
    Logical {
        operator: LogicalOperator,
        children: Vec<FilterNode>,
    },
    /// Explicit parenthesization. Transparent to evaluation.
    Group { child: Box<FilterNode> },
}

impl FilterNode {
    pub fn comparison(
        field: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<FilterValue>,
    ) -> FilterNode {
        FilterNode::Comparison {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Conjunction. Requires at least two children.
    pub fn and(children: Vec<FilterNode>) -> Result<FilterNode, FilterError> {
        Self::logical(LogicalOperator::And, children)
    }

    /// Disjunction. Requires at least two children.
    pub fn or(children: Vec<FilterNode>) -> Result<FilterNode, FilterError> {
        Self::logical(LogicalOperator::Or, children)
    }

    fn logical(
        operator: LogicalOperator,
        children: Vec<FilterNode>,
    ) -> Result<FilterNode, FilterError> {
        if children.len() < 2 {
            return Err(FilterError::validation(format!(
                "{} requires at least two children, got {}",
                operator,
                children.len()
            )));
        }
        Ok(FilterNode::Logical { operator, children })
    }

    /// Negation of a single child.
    pub fn negate(child: FilterNode) -> FilterNode {
        FilterNode::Logical {
            operator: LogicalOperator::Not,
            children: vec![child],
        }
    }

    pub fn group(child: FilterNode) -> FilterNode {
        FilterNode::Group {
            child: Box::new(child),
        }
    }

    /// Nesting depth including group wrappers.
    pub fn depth(&self) -> usize {
        match self {
            FilterNode::Comparison { .. } => 1,
            FilterNode::Logical { children, .. } => {
                1 + children.iter().map(FilterNode::depth).max().unwrap_or(0)
            }
            FilterNode::Group { child } => 1 + child.depth(),
        }
    }

    /// Descend through group wrappers to the first semantic node.
    pub fn unwrap_groups(&self) -> &FilterNode {
        match self {
            FilterNode::Group { child } => child.unwrap_groups(),
            other => other,
        }
    }

    /// Check arity and size invariants against `limits`.
    pub fn validate(&self, limits: &FilterLimits) -> Result<(), FilterError> {
        if self.depth() > limits.max_depth {
            return Err(FilterError::validation(format!(
                "filter depth {} exceeds maximum {}",
                self.depth(),
                limits.max_depth
            )));
        }
        self.validate_arity(limits)
    }

    fn validate_arity(&self, limits: &FilterLimits) -> Result<(), FilterError> {
        match self {
            FilterNode::Comparison { .. } => Ok(()),
            FilterNode::Group { child } => child.validate_arity(limits),
            FilterNode::Logical { operator, children } => {
                match operator {
                    LogicalOperator::Not => {
                        if children.len() != 1 {
                            return Err(FilterError::validation(format!(
                                "NOT requires exactly one child, got {}",
                                children.len()
                            )));
                        }
                    }
                    LogicalOperator::And | LogicalOperator::Or => {
                        if children.len() < 2 {
                            return Err(FilterError::validation(format!(
                                "{} requires at least two children, got {}",
                                operator,
                                children.len()
                            )));
                        }
                        if children.len() > limits.max_children {
                            return Err(FilterError::validation(format!(
                                "{} has {} children, maximum is {}",
                                operator,
                                children.len(),
                                limits.max_children
                            )));
                        }
                    }
                }
                for child in children {
                    child.validate_arity(limits)?;
                }
                Ok(())
            }
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if matches!(self, FilterNode::Logical { .. }) {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Comparison {
                field,
                operator,
                value,
            } => {
                if let FilterValue::String(s) = value {
                    write!(f, "{field} {operator} '{s}'")
                } else {
                    write!(f, "{field} {operator} {value}")
                }
            }
            FilterNode::Logical { operator, children } => {
                if *operator == LogicalOperator::Not {
                    f.write_str("NOT ")?;
                    return children[0].fmt_operand(f);
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {operator} ")?;
                    }
                    child.fmt_operand(f)?;
                }
                Ok(())
            }
            FilterNode::Group { child } => write!(f, "({child})"),
        }
    }
}
