//! Search queries, structured filters, and ranked results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::format_timestamp;
use crate::error::ValidationError;
use crate::record::{MemoryKind, MemoryRecord};

/// Hard cap on `limit` regardless of configuration.
pub const MAX_LIMIT: usize = 500;

/// Hard cap on query text length, in bytes.
pub const MAX_QUERY_LENGTH: usize = 1_000;

fn default_limit() -> usize {
    10
}

/// How the final result set should be ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Composite relevance score, descending.
    #[default]
    Relevance,
    /// Most recently created first.
    Newest,
    /// Oldest first.
    Oldest,
}

/// A search request as accepted by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query. May be empty; strategy selection reacts to the shape.
    #[serde(default)]
    pub text: String,
    /// Maximum results to return after ranking.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Results to skip before collecting `limit`.
    #[serde(default)]
    pub offset: usize,
    /// Structured filters applied by individual strategies.
    #[serde(default)]
    pub filters: QueryFilters,
    /// Optional textual filter expression applied to merged results.
    #[serde(default)]
    pub filter_expression: Option<String>,
    /// Final ordering. Defaults to relevance.
    #[serde(default)]
    pub sort_by: SortOrder,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            limit: default_limit(),
            offset: 0,
            filters: QueryFilters::default(),
            filter_expression: None,
            sort_by: SortOrder::default(),
        }
    }
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_filter_expression(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self
    }

    pub fn with_sort(mut self, sort_by: SortOrder) -> Self {
        self.sort_by = sort_by;
        self
    }

    /// True when the free-text portion carries no usable terms.
    pub fn has_empty_text(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Whitespace-separated term count of the free-text portion.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Total results the orchestrator must collect before truncation.
    pub fn collection_target(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }

    /// Reject malformed parameters before any strategy runs.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == 0 {
            return Err(ValidationError::new("limit must be greater than zero"));
        }
        if self.limit > MAX_LIMIT {
            return Err(ValidationError::new(format!(
                "limit {} exceeds maximum of {}",
                self.limit, MAX_LIMIT
            )));
        }
        if self.text.len() > MAX_QUERY_LENGTH {
            return Err(ValidationError::new(format!(
                "query text exceeds {} bytes",
                MAX_QUERY_LENGTH
            )));
        }
        self.filters.validate()
    }
}

/// Structured (non-expression) filters attached to a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Restrict to these record kinds. Empty means all kinds.
    #[serde(default)]
    pub kinds: Vec<MemoryKind>,
    /// Restrict to records whose `category` metadata matches any entry.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Only records created at or after this instant.
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    /// Only records created at or before this instant.
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
    /// Exact-match constraints on metadata keys.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
            && self.categories.is_empty()
            && self.created_after.is_none()
            && self.created_before.is_none()
            && self.metadata.is_empty()
    }

    pub fn has_category_filters(&self) -> bool {
        !self.categories.is_empty() || !self.kinds.is_empty()
    }

    pub fn has_temporal_filters(&self) -> bool {
        self.created_after.is_some() || self.created_before.is_some()
    }

    pub fn has_metadata_filters(&self) -> bool {
        !self.metadata.is_empty()
    }

    /// True when `kind` passes the kind restriction (empty allows all).
    pub fn matches_kind(&self, kind: MemoryKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(after), Some(before)) = (self.created_after, self.created_before) {
            if after > before {
                return Err(ValidationError::new(
                    "created_after must not be later than created_before",
                ));
            }
        }
        Ok(())
    }
}

/// One ranked hit returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Identifier of the underlying record.
    pub id: String,
    /// Record text.
    pub content: String,
    /// Metadata carried over from the record, plus the `classification` key.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Composite relevance score. Higher is better.
    pub score: f32,
    /// Name of the strategy that produced this hit.
    pub strategy: String,
    /// Creation time of the underlying record.
    pub timestamp: DateTime<Utc>,
}

impl SearchResult {
    /// Build a result from a record hit, tagging the producing strategy.
    ///
    /// The record's classification is folded into the metadata map so filter
    /// expressions over merged results can still see it.
    pub fn from_record(record: &MemoryRecord, score: f32, strategy: impl Into<String>) -> Self {
        let mut metadata = record.metadata.clone();
        metadata
            .entry("classification".to_string())
            .or_insert_with(|| Value::String(record.kind.as_str().to_string()));
        Self {
            id: record.id.clone(),
            content: record.content.clone(),
            metadata,
            score,
            strategy: strategy.into(),
            timestamp: record.created_at,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Project into a flat JSON document for post-merge filtering.
    ///
    /// Same layout rules as record projection: metadata spread at the top
    /// level, intrinsic fields winning on collision, nested copy under
    /// `metadata`.
    pub fn as_document(&self) -> Value {
        let mut doc = Map::new();
        for (key, value) in &self.metadata {
            doc.insert(key.clone(), value.clone());
        }
        doc.insert("id".into(), Value::String(self.id.clone()));
        doc.insert("content".into(), Value::String(self.content.clone()));
        doc.insert("score".into(), Value::from(f64::from(self.score)));
        doc.insert("strategy".into(), Value::String(self.strategy.clone()));
        doc.insert(
            "timestamp".into(),
            Value::String(format_timestamp(self.timestamp)),
        );
        doc.insert("metadata".into(), Value::Object(self.metadata.clone()));
        Value::Object(doc)
    }
}
