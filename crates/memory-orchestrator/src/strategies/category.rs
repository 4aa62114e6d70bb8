//! Category and classification matching through filter trees.

use std::sync::Arc;

use async_trait::async_trait;

use memory_filter::{ComparisonOperator, FilterNode};
use memory_planner::SelectivityEstimator;
use memory_types::{SearchQuery, SearchResult, StrategyConfig, StrategyError};

use crate::store::MemoryStore;
use crate::strategies::{fetch_budget, passes_filters, FilterPipeline, SearchStrategy, CATEGORY};

const PRIORITY: i32 = 7;
const SCORE: f32 = 0.7;

/// Words in query text that signal intent to search by category.
pub(crate) const CATEGORY_KEYWORDS: &[&str] =
    &["category", "categories", "kind", "classified", "type"];

/// Selects records by category metadata and retention classification.
///
/// Structured filters drive the selection when present; otherwise the
/// query's own words are tried as candidate category values, which covers
/// phrasings like "show the work category".
pub struct CategoryStrategy {
    pipeline: FilterPipeline,
    max_results: usize,
}

impl CategoryStrategy {
    pub fn new(estimator: Arc<SelectivityEstimator>) -> Self {
        Self {
            pipeline: FilterPipeline::new(estimator),
            max_results: StrategyConfig::default().max_results,
        }
    }

    fn category_tree(query: &SearchQuery) -> Option<FilterNode> {
        let filters = &query.filters;
        let mut branches = Vec::new();
        if !filters.kinds.is_empty() {
            let kinds: Vec<String> = filters
                .kinds
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect();
            branches.push(FilterNode::comparison(
                "classification",
                ComparisonOperator::In,
                kinds,
            ));
        }
        if !filters.categories.is_empty() {
            branches.push(FilterNode::comparison(
                "category",
                ComparisonOperator::In,
                filters.categories.clone(),
            ));
        }
        if branches.is_empty() {
            let terms: Vec<String> = query
                .text
                .to_lowercase()
                .split_whitespace()
                .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
                .filter(|word| !word.is_empty())
                .collect();
            if terms.is_empty() {
                return None;
            }
            branches.push(FilterNode::comparison(
                "category",
                ComparisonOperator::In,
                terms,
            ));
        }
        match branches.len() {
            1 => branches.pop(),
            _ => FilterNode::and(branches).ok(),
        }
    }
}

#[async_trait]
impl SearchStrategy for CategoryStrategy {
    fn name(&self) -> &'static str {
        CATEGORY
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn can_handle(&self, query: &SearchQuery) -> bool {
        query.filters.has_category_filters() || !query.has_empty_text()
    }

    fn reconfigure(&mut self, config: &StrategyConfig) {
        self.max_results = config.max_results;
    }

    async fn execute(
        &self,
        query: &SearchQuery,
        store: &dyn MemoryStore,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        let Some(tree) = Self::category_tree(query) else {
            return Err(StrategyError::invalid_query(
                CATEGORY,
                "no category filters or query text to match against",
            ));
        };

        let budget = fetch_budget(query, self.max_results);
        let records = self
            .pipeline
            .candidates(CATEGORY, store, &tree, budget.saturating_mul(2))
            .await?;

        let results = records
            .into_iter()
            .filter(|record| passes_filters(record, &query.filters))
            .take(budget)
            .map(|record| SearchResult::from_record(&record, SCORE, CATEGORY))
            .collect();
        Ok(results)
    }
}
