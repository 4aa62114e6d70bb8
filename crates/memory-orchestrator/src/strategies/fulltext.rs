//! Primary text-search strategy.

use async_trait::async_trait;
use tracing::debug;

use memory_types::{SearchQuery, SearchResult, StrategyConfig, StrategyError};

use crate::store::MemoryStore;
use crate::strategies::{fetch_budget, passes_filters, SearchStrategy, FULLTEXT};

const PRIORITY: i32 = 10;

/// Matches records containing the query's terms, scored by the fraction of
/// terms found in the content.
pub struct FullTextStrategy {
    max_results: usize,
}

impl FullTextStrategy {
    pub fn new() -> Self {
        Self {
            max_results: StrategyConfig::default().max_results,
        }
    }
}

impl Default for FullTextStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStrategy for FullTextStrategy {
    fn name(&self) -> &'static str {
        FULLTEXT
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
        let terms: Vec<String> = query
            .text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if terms.is_empty() {
            return Err(StrategyError::invalid_query(
                FULLTEXT,
                "full-text search needs query text",
            ));
        }

        let budget = fetch_budget(query, self.max_results);
        // Structured filters prune after the fetch; leave headroom for them.
        let fetch = if query.filters.is_empty() {
            budget
        } else {
            budget.saturating_mul(2)
        };
        let records = store
            .text_search(&query.text, fetch)
            .await
            .map_err(|e| StrategyError::from_store(FULLTEXT, &e))?;

        let mut results = Vec::new();
        for record in records {
            if !passes_filters(&record, &query.filters) {
                continue;
            }
            let content = record.content.to_lowercase();
            let matched = terms.iter().filter(|term| content.contains(term.as_str())).count();
            if matched == 0 {
                continue;
            }
            let score = matched as f32 / terms.len() as f32;
            results.push(SearchResult::from_record(&record, score, FULLTEXT));
            if results.len() == budget {
                break;
            }
        }
        debug!(
            terms = terms.len(),
            results = results.len(),
            "full-text strategy finished"
        );
        Ok(results)
    }
}
