//! Metadata-constraint matching.

use std::sync::Arc;

use async_trait::async_trait;

use memory_filter::{ComparisonOperator, FilterNode, FilterValue};
use memory_planner::SelectivityEstimator;
use memory_types::{
    MemoryRecord, SearchQuery, SearchResult, StrategyConfig, StrategyError,
};
use serde_json::Value;

use crate::store::MemoryStore;
use crate::strategies::{fetch_budget, passes_filters, FilterPipeline, SearchStrategy, METADATA};

const PRIORITY: i32 = 6;
const SCORE: f32 = 0.65;

/// Words in query text that signal intent to search by metadata.
pub(crate) const METADATA_KEYWORDS: &[&str] =
    &["tag", "tagged", "metadata", "property", "attribute"];

/// Selects records whose metadata satisfies the query's constraints.
///
/// Structured metadata filters become an equality tree run through the
/// shared pipeline. Scalar values lower into the tree; anything else (nested
/// objects, arrays) is enforced by the exact filter check afterwards.
/// Without structured filters, records match when any metadata value equals
/// one of the query's words.
pub struct MetadataStrategy {
    pipeline: FilterPipeline,
    max_results: usize,
}

impl MetadataStrategy {
    pub fn new(estimator: Arc<SelectivityEstimator>) -> Self {
        Self {
            pipeline: FilterPipeline::new(estimator),
            max_results: StrategyConfig::default().max_results,
        }
    }

    fn filter_value(value: &Value) -> Option<FilterValue> {
        match value {
            Value::String(s) => Some(FilterValue::String(s.clone())),
            Value::Number(n) => n.as_f64().map(FilterValue::Number),
            Value::Bool(b) => Some(FilterValue::Bool(*b)),
            _ => None,
        }
    }

    fn metadata_tree(query: &SearchQuery) -> Option<FilterNode> {
        let mut branches: Vec<FilterNode> = query
            .filters
            .metadata
            .iter()
            .filter_map(|(key, value)| {
                Self::filter_value(value)
                    .map(|value| FilterNode::comparison(key, ComparisonOperator::Eq, value))
            })
            .collect();
        match branches.len() {
            0 => None,
            1 => branches.pop(),
            _ => FilterNode::and(branches).ok(),
        }
    }

    fn matches_query_terms(record: &MemoryRecord, query: &SearchQuery) -> bool {
        let terms: Vec<String> = query
            .text
            .to_lowercase()
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|word| !word.is_empty())
            .collect();
        record.metadata.values().any(|value| match value {
            Value::String(s) => terms.iter().any(|term| s.eq_ignore_ascii_case(term)),
            _ => false,
        })
    }
}

#[async_trait]
impl SearchStrategy for MetadataStrategy {
    fn name(&self) -> &'static str {
        METADATA
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn can_handle(&self, query: &SearchQuery) -> bool {
        query.filters.has_metadata_filters() || !query.has_empty_text()
    }

    fn reconfigure(&mut self, config: &StrategyConfig) {
        self.max_results = config.max_results;
    }

    async fn execute(
        &self,
        query: &SearchQuery,
        store: &dyn MemoryStore,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        let budget = fetch_budget(query, self.max_results);

        let records = if query.filters.has_metadata_filters() {
            match Self::metadata_tree(query) {
                Some(tree) => {
                    self.pipeline
                        .candidates(METADATA, store, &tree, budget.saturating_mul(2))
                        .await?
                }
                // Every constraint is non-scalar; fall back to a plain scan
                // and let the exact check below do the work.
                None => store
                    .scan()
                    .await
                    .map_err(|e| StrategyError::from_store(METADATA, &e))?,
            }
        } else {
            let scanned = store
                .scan()
                .await
                .map_err(|e| StrategyError::from_store(METADATA, &e))?;
            scanned
                .into_iter()
                .filter(|record| Self::matches_query_terms(record, query))
                .collect()
        };

        let results = records
            .into_iter()
            .filter(|record| passes_filters(record, &query.filters))
            .take(budget)
            .map(|record| SearchResult::from_record(&record, SCORE, METADATA))
            .collect();
        Ok(results)
    }
}
