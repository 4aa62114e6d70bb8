//! Typed filter values and parse-time coercion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Right-hand side of a comparison.
///
/// Values are typed at parse time rather than carried as raw strings so the
/// evaluator and the selectivity model can branch on the value's shape
/// without re-parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    String(String),
    Number(f64),
    Bool(bool),
    StringArray(Vec<String>),
}

impl FilterValue {
    /// Coerce a raw value token into a typed value.
    ///
    /// Quoted tokens (quotes still present in the token text) always become
    /// strings. Unquoted tokens try, in order: number, boolean, comma list,
    /// plain string.
    pub fn coerce(raw: &str) -> FilterValue {
        if let Some(inner) = strip_quotes(raw) {
            return FilterValue::String(inner.to_string());
        }
        if is_number(raw) {
            if let Ok(n) = raw.parse::<f64>() {
                return FilterValue::Number(n);
            }
        }
        if raw == "true" {
            return FilterValue::Bool(true);
        }
        if raw == "false" {
            return FilterValue::Bool(false);
        }
        if raw.contains(',') {
            let items = raw.split(',').map(|s| s.trim().to_string()).collect();
            return FilterValue::StringArray(items);
        }
        FilterValue::String(raw.to_string())
    }

    /// Name of the value's type, used in cache keys and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FilterValue::String(_) => "string",
            FilterValue::Number(_) => "number",
            FilterValue::Bool(_) => "boolean",
            FilterValue::StringArray(_) => "array",
        }
    }

    /// Numeric view used by range comparisons. Strings are parsed, booleans
    /// never coerce.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FilterValue::Number(n) => Some(*n),
            FilterValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Membership view used by `IN`/`NOT IN`. Scalar values act as a
    /// singleton set.
    pub fn as_members(&self) -> Vec<String> {
        match self {
            FilterValue::StringArray(items) => items.clone(),
            other => vec![other.to_string()],
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FilterValue::StringArray(_))
    }
}

/// Strip one layer of matching surrounding quotes, if present.
fn strip_quotes(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'\'' || first == b'"') {
            return Some(&raw[1..raw.len() - 1]);
        }
    }
    None
}

/// Signed decimal number pattern: optional sign, digits, optional fraction.
///
/// Deliberately narrow. `"5."` and `".5"` do not match and fall through to
/// the dotted-field rule, which downstream behavior depends on.
pub(crate) fn is_number(text: &str) -> bool {
    let rest = text.strip_prefix(['+', '-']).unwrap_or(text);
    if rest.is_empty() {
        return false;
    }
    let mut parts = rest.splitn(2, '.');
    let integral = parts.next().unwrap_or("");
    if integral.is_empty() || !integral.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match parts.next() {
        None => true,
        Some(frac) => !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()),
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::String(s) => f.write_str(s),
            FilterValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            FilterValue::Bool(b) => write!(f, "{b}"),
            FilterValue::StringArray(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::String(s)
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        FilterValue::Number(n)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        FilterValue::Number(n as f64)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Bool(b)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(items: Vec<String>) -> Self {
        FilterValue::StringArray(items)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(items: Vec<&str>) -> Self {
        FilterValue::StringArray(items.into_iter().map(str::to_string).collect())
    }
}
