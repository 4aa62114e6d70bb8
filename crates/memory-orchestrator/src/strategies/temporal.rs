//! Time-window matching.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use memory_types::{
    SearchQuery, SearchResult, SharedClock, StrategyConfig, StrategyError, SystemClock,
};

use crate::store::MemoryStore;
use crate::strategies::{contains_keyword, fetch_budget, passes_filters, SearchStrategy, TEMPORAL};

const PRIORITY: i32 = 5;
const SCORE: f32 = 0.6;

/// Words in query text that signal intent to search by time.
pub(crate) const TEMPORAL_KEYWORDS: &[&str] = &[
    "today", "yesterday", "week", "month", "ago", "before", "after", "latest", "earlier",
    "recent",
];

/// Lookback window implied by the query's wording, if any.
///
/// Coarse on purpose: "yesterday" spans two days so late-evening records
/// still surface, and the generic recency words get a week.
pub(crate) fn keyword_lookback(text: &str) -> Option<Duration> {
    let specific: &[(&str, i64)] = &[
        ("today", 1),
        ("yesterday", 2),
        ("week", 7),
        ("month", 31),
    ];
    for (keyword, days) in specific {
        if contains_keyword(text, &[keyword]) {
            return Some(Duration::days(*days));
        }
    }
    let generic = &["ago", "before", "after", "latest", "earlier", "recent"];
    contains_keyword(text, generic).then(|| Duration::days(7))
}

/// Selects records inside a creation-time window.
///
/// Structured `created_after`/`created_before` filters define the window
/// when present; otherwise it is derived from temporal wording in the
/// query text relative to the injected clock.
pub struct TemporalStrategy {
    clock: SharedClock,
    max_results: usize,
}

impl TemporalStrategy {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            clock,
            max_results: StrategyConfig::default().max_results,
        }
    }

    fn window(&self, query: &SearchQuery) -> Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        if query.filters.has_temporal_filters() {
            return Some((query.filters.created_after, query.filters.created_before));
        }
        let lookback = keyword_lookback(&query.text)?;
        Some((Some(self.clock.now() - lookback), None))
    }
}

impl Default for TemporalStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStrategy for TemporalStrategy {
    fn name(&self) -> &'static str {
        TEMPORAL
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn can_handle(&self, query: &SearchQuery) -> bool {
        query.filters.has_temporal_filters() || keyword_lookback(&query.text).is_some()
    }

    fn reconfigure(&mut self, config: &StrategyConfig) {
        self.max_results = config.max_results;
    }

    async fn execute(
        &self,
        query: &SearchQuery,
        store: &dyn MemoryStore,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        let Some((after, before)) = self.window(query) else {
            return Err(StrategyError::invalid_query(
                TEMPORAL,
                "query carries no time window",
            ));
        };

        let budget = fetch_budget(query, self.max_results);
        let mut records = store
            .scan()
            .await
            .map_err(|e| StrategyError::from_store(TEMPORAL, &e))?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let results = records
            .into_iter()
            .filter(|record| {
                after.map_or(true, |at| record.created_at >= at)
                    && before.map_or(true, |at| record.created_at <= at)
                    && passes_filters(record, &query.filters)
            })
            .take(budget)
            .map(|record| SearchResult::from_record(&record, SCORE, TEMPORAL))
            .collect();
        Ok(results)
    }
}
