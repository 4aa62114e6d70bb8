//! Lexical-overlap strategy for complex queries.

use std::collections::HashSet;

use async_trait::async_trait;

use memory_types::{MemoryKind, SearchQuery, SearchResult, StrategyConfig, StrategyError};

use crate::store::MemoryStore;
use crate::strategies::{contains_keyword, fetch_budget, passes_filters, SearchStrategy, SEMANTIC};

const PRIORITY: i32 = 8;

/// Connective words that mark a query as reasoning about relationships
/// rather than naming a literal phrase.
pub(crate) const CONNECTIVES: &[&str] = &["because", "therefore", "however"];

/// Whether `query` is complex enough to benefit from similarity matching:
/// more than three words, or any connective word.
pub(crate) fn is_complex(query: &SearchQuery) -> bool {
    if query.has_empty_text() {
        return false;
    }
    query.word_count() > 3 || contains_keyword(&query.text, CONNECTIVES)
}

/// Scores records by word-set overlap with the query (Jaccard index).
///
/// A stand-in for embedding search that needs no model: complex queries
/// rarely appear verbatim in stored content, but they share vocabulary
/// with the records they are about.
pub struct SemanticStrategy {
    max_results: usize,
}

impl SemanticStrategy {
    pub fn new() -> Self {
        Self {
            max_results: StrategyConfig::default().max_results,
        }
    }

    fn word_set(text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|word| !word.is_empty())
            .collect()
    }

    fn similarity(query_words: &HashSet<String>, content: &str) -> f32 {
        let content_words = Self::word_set(content);
        if query_words.is_empty() || content_words.is_empty() {
            return 0.0;
        }
        let shared = query_words.intersection(&content_words).count();
        let union = query_words.union(&content_words).count();
        shared as f32 / union as f32
    }
}

impl Default for SemanticStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStrategy for SemanticStrategy {
    fn name(&self) -> &'static str {
        SEMANTIC
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn can_handle(&self, query: &SearchQuery) -> bool {
        is_complex(query)
    }

    /// Archival records are never part of the similarity corpus.
    fn supported_kinds(&self) -> Vec<MemoryKind> {
        vec![
            MemoryKind::Essential,
            MemoryKind::Conversational,
            MemoryKind::Reference,
        ]
    }

    fn reconfigure(&mut self, config: &StrategyConfig) {
        self.max_results = config.max_results;
    }

    async fn execute(
        &self,
        query: &SearchQuery,
        store: &dyn MemoryStore,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        let query_words = Self::word_set(&query.text);
        if query_words.is_empty() {
            return Err(StrategyError::invalid_query(
                SEMANTIC,
                "similarity search needs query text",
            ));
        }

        let budget = fetch_budget(query, self.max_results);
        let records = store
            .scan()
            .await
            .map_err(|e| StrategyError::from_store(SEMANTIC, &e))?;
        let supported = self.supported_kinds();

        let mut scored: Vec<(f32, SearchResult)> = records
            .into_iter()
            .filter(|record| {
                supported.contains(&record.kind) && passes_filters(record, &query.filters)
            })
            .filter_map(|record| {
                let score = Self::similarity(&query_words, &record.content);
                (score > 0.0)
                    .then(|| (score, SearchResult::from_record(&record, score, SEMANTIC)))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(budget)
            .map(|(_, result)| result)
            .collect())
    }
}
