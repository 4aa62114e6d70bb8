//! Scripted strategy for exercising orchestrator failure paths.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use memory_types::{SearchQuery, SearchResult, StrategyError};

use crate::store::MemoryStore;
use crate::strategies::SearchStrategy;

/// Strategy that follows a script instead of touching the store.
///
/// Queued failures are consumed one per call; once the queue is empty the
/// strategy succeeds with its configured results. A persistent failure set
/// via [`always_failing`](Self::always_failing) never recovers. Useful for
/// driving retries, fallback chains, and circuit breakers deterministically.
pub struct ScriptedStrategy {
    name: &'static str,
    priority: i32,
    results: Vec<SearchResult>,
    failures: Mutex<VecDeque<StrategyError>>,
    persistent: Option<StrategyError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedStrategy {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            priority: 5,
            results: Vec::new(),
            failures: Mutex::new(VecDeque::new()),
            persistent: None,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Results returned by every successful call.
    pub fn with_results(mut self, results: Vec<SearchResult>) -> Self {
        self.results = results;
        self
    }

    /// Queue an error for the next unanswered call.
    pub fn with_failure(self, error: StrategyError) -> Self {
        {
            let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
            failures.push_back(error);
        }
        self
    }

    /// Fail every call with clones of `error`.
    pub fn always_failing(mut self, error: StrategyError) -> Self {
        self.persistent = Some(error);
        self
    }

    /// Sleep before answering, to trip per-strategy timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times `execute` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Counter handle that stays readable after the strategy is boxed and
    /// handed to an orchestrator.
    pub fn call_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Convenience result carrying just an id and score.
    pub fn result(id: &str, score: f32, strategy: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            content: format!("content of {id}"),
            metadata: serde_json::Map::new(),
            score,
            strategy: strategy.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SearchStrategy for ScriptedStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    /// Scripted strategies accept every query; tests control execution
    /// through the orchestrator's ordering instead.
    fn can_handle(&self, _query: &SearchQuery) -> bool {
        true
    }

    async fn execute(
        &self,
        _query: &SearchQuery,
        _store: &dyn MemoryStore,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.persistent {
            return Err(error.clone());
        }
        let next_failure = {
            let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
            failures.pop_front()
        };
        match next_failure {
            Some(error) => Err(error),
            None => Ok(self.results.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn queued_failures_drain_before_success() {
        let strategy = ScriptedStrategy::new("scripted")
            .with_results(vec![ScriptedStrategy::result("r1", 0.9, "scripted")])
            .with_failure(StrategyError::internal("scripted", "database is locked"));
        let store = InMemoryStore::new();
        let query = SearchQuery::text("x");

        assert!(strategy.execute(&query, &store).await.is_err());
        let results = strategy.execute(&query, &store).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(strategy.calls(), 2);
    }

    #[tokio::test]
    async fn persistent_failures_never_recover() {
        let strategy = ScriptedStrategy::new("scripted")
            .always_failing(StrategyError::internal("scripted", "corrupt index"));
        let store = InMemoryStore::new();
        let query = SearchQuery::text("x");

        for _ in 0..3 {
            assert!(strategy.execute(&query, &store).await.is_err());
        }
        assert_eq!(strategy.calls(), 3);
    }
}
