//! Recency strategy: newest records first, no text matching.

use async_trait::async_trait;

use memory_types::{SearchQuery, SearchResult, StrategyConfig, StrategyError};

use crate::store::MemoryStore;
use crate::strategies::{fetch_budget, passes_filters, SearchStrategy, RECENT};

const PRIORITY: i32 = 3;

/// Serves empty-text queries and acts as the terminal fallback. Scores decay
/// with position so newer records outrank older ones after merging.
pub struct RecentStrategy {
    max_results: usize,
}

impl RecentStrategy {
    pub fn new() -> Self {
        Self {
            max_results: StrategyConfig::default().max_results,
        }
    }
}

impl Default for RecentStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStrategy for RecentStrategy {
    fn name(&self) -> &'static str {
        RECENT
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn can_handle(&self, _query: &SearchQuery) -> bool {
        true
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
        let fetch = if query.filters.is_empty() {
            budget
        } else {
            budget.saturating_mul(2)
        };
        let records = store
            .recent(fetch)
            .await
            .map_err(|e| StrategyError::from_store(RECENT, &e))?;

        let results = records
            .into_iter()
            .filter(|record| passes_filters(record, &query.filters))
            .take(budget)
            .enumerate()
            .map(|(index, record)| {
                let score = 1.0 / (1.0 + index as f32);
                SearchResult::from_record(&record, score, RECENT)
            })
            .collect();
        Ok(results)
    }
}
