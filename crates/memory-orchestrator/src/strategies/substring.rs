//! Whole-phrase substring fallback.

use async_trait::async_trait;

use memory_types::{SearchQuery, SearchResult, StrategyConfig, StrategyError};

use crate::store::MemoryStore;
use crate::strategies::{fetch_budget, passes_filters, SearchStrategy, SUBSTRING};

const PRIORITY: i32 = 2;
const SCORE: f32 = 0.4;

/// Matches the query text as one literal, case-insensitive substring.
///
/// Deliberately crude: this is the unconditional last entry in the strategy
/// order and the fallback target when full-text search fails, so it must
/// not depend on anything beyond a store scan.
pub struct SubstringStrategy {
    max_results: usize,
}

impl SubstringStrategy {
    pub fn new() -> Self {
        Self {
            max_results: StrategyConfig::default().max_results,
        }
    }
}

impl Default for SubstringStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStrategy for SubstringStrategy {
    fn name(&self) -> &'static str {
        SUBSTRING
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn can_handle(&self, query: &SearchQuery) -> bool {
        !query.has_empty_text()
    }

    fn reconfigure(&mut self, config: &StrategyConfig) {
        self.max_results = config.max_results;
    }

    async fn execute(
        &self,
        query: &SearchQuery,
        store: &dyn MemoryStore,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        let needle = query.text.trim().to_lowercase();
        if needle.is_empty() {
            return Err(StrategyError::invalid_query(
                SUBSTRING,
                "substring search needs query text",
            ));
        }

        let budget = fetch_budget(query, self.max_results);
        let mut records = store
            .scan()
            .await
            .map_err(|e| StrategyError::from_store(SUBSTRING, &e))?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let results = records
            .into_iter()
            .filter(|record| {
                record.content.to_lowercase().contains(&needle)
                    && passes_filters(record, &query.filters)
            })
            .take(budget)
            .map(|record| SearchResult::from_record(&record, SCORE, SUBSTRING))
            .collect();
        Ok(results)
    }
}
