//! Fault-tolerant search across an ordered set of strategies.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use memory_filter::{evaluate, FilterLimits, FilterParser};
use memory_planner::{FilterOptimizer, SelectivityEstimator};
use memory_resilience::{retry_with_backoff, BreakerRegistry, BreakerSnapshot, ErrorTracker, TrackerSnapshot};
use memory_types::{
    ConfigError, EngineConfig, SearchQuery, SearchResult, SharedClock, StrategyConfig,
    StrategyError, StrategyErrorKind, SystemClock,
};

use crate::error::SearchError;
use crate::ordering::strategy_order;
use crate::ranking::rank_results;
use crate::store::MemoryStore;
use crate::strategies::{default_strategies, SearchStrategy, FULLTEXT, RECENT, SUBSTRING};

/// Outcome of one orchestrated search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Ranked results after filtering and pagination.
    pub results: Vec<SearchResult>,
    /// Strategy names that actually executed, in execution order, fallbacks
    /// included.
    pub strategies_attempted: Vec<String>,
    /// Whether any results came from a fallback strategy.
    pub fallback_occurred: bool,
    /// Whether an unusable filter expression forced the unfiltered,
    /// unranked result set.
    pub filter_downgraded: bool,
    /// Wall time spent inside the orchestrator.
    pub total_time_ms: u64,
}

impl SearchResponse {
    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }

    pub fn count(&self) -> usize {
        self.results.len()
    }
}

/// Operational snapshot for diagnostics endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub breakers: Vec<BreakerSnapshot>,
    pub errors: TrackerSnapshot,
    pub recommendations: Vec<String>,
}

/// Runs strategies in policy order behind circuit breakers and timeouts,
/// merges their results, and applies post-filtering and ranking.
///
/// A search only fails outright when the query itself is invalid. Strategy
/// failures are retried, substituted via the fallback chain, or swallowed;
/// the orchestrator returns whatever it managed to collect.
pub struct SearchOrchestrator {
    store: Arc<dyn MemoryStore>,
    strategies: Vec<Box<dyn SearchStrategy>>,
    config: EngineConfig,
    breakers: BreakerRegistry,
    tracker: ErrorTracker,
    optimizer: FilterOptimizer,
    clock: SharedClock,
}

impl SearchOrchestrator {
    /// Orchestrator with the default configuration and strategy set.
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn MemoryStore>, config: EngineConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn MemoryStore>,
        config: EngineConfig,
        clock: SharedClock,
    ) -> Self {
        let estimator = Arc::new(SelectivityEstimator::with_capacity(
            config.filter.selectivity_cache_capacity,
        ));
        let strategies = default_strategies(&estimator, Arc::clone(&clock));
        Self::assemble(store, config, clock, estimator, strategies)
    }

    /// Orchestrator over a caller-supplied strategy set, for embedding
    /// custom retrieval or scripting failures in tests.
    pub fn with_strategies(
        store: Arc<dyn MemoryStore>,
        config: EngineConfig,
        clock: SharedClock,
        strategies: Vec<Box<dyn SearchStrategy>>,
    ) -> Self {
        let estimator = Arc::new(SelectivityEstimator::with_capacity(
            config.filter.selectivity_cache_capacity,
        ));
        Self::assemble(store, config, clock, estimator, strategies)
    }

    fn assemble(
        store: Arc<dyn MemoryStore>,
        config: EngineConfig,
        clock: SharedClock,
        estimator: Arc<SelectivityEstimator>,
        mut strategies: Vec<Box<dyn SearchStrategy>>,
    ) -> Self {
        for strategy in &mut strategies {
            let limits = config.strategy_config(strategy.name());
            strategy.reconfigure(&limits);
        }
        let breakers =
            BreakerRegistry::with_clock(config.circuit_breaker.clone(), Arc::clone(&clock));
        let tracker = ErrorTracker::from_config(&config.orchestrator, Arc::clone(&clock));
        let optimizer = FilterOptimizer::new(estimator);
        Self {
            store,
            strategies,
            config,
            breakers,
            tracker,
            optimizer,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    pub fn tracker(&self) -> &ErrorTracker {
        &self.tracker
    }

    /// Breaker states, error counts, and the tracker's advice in one place.
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            breakers: self.breakers.snapshots(),
            errors: self.tracker.snapshot(),
            recommendations: self.tracker.recommendations(),
        }
    }

    /// Apply a full configuration update.
    ///
    /// The update is validated before anything changes; on failure the
    /// previous configuration stays in force everywhere. Breaker and
    /// tracker state survives unless their own sections changed.
    pub fn reconfigure(&mut self, config: EngineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        for strategy in &mut self.strategies {
            let limits = config.strategy_config(strategy.name());
            strategy.reconfigure(&limits);
        }
        if config.circuit_breaker != self.config.circuit_breaker {
            self.breakers = BreakerRegistry::with_clock(
                config.circuit_breaker.clone(),
                Arc::clone(&self.clock),
            );
        }
        if config.orchestrator != self.config.orchestrator {
            self.tracker = ErrorTracker::from_config(&config.orchestrator, Arc::clone(&self.clock));
        }
        self.config = config;
        info!("engine configuration updated");
        Ok(())
    }

    /// Update one strategy's limits, leaving everything else untouched.
    pub fn reconfigure_strategy(
        &mut self,
        name: &str,
        config: StrategyConfig,
    ) -> Result<(), ConfigError> {
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("strategies.{name}: {e}")))?;
        self.config.strategies.insert(name.to_string(), config.clone());
        if let Some(strategy) = self.strategies.iter_mut().find(|s| s.name() == name) {
            strategy.reconfigure(&config);
        }
        Ok(())
    }

    /// Run `query` through the full pipeline.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        query.validate()?;

        let order = strategy_order(query);
        debug!(query = %query.text, order = ?order, "starting search");

        let target = query.collection_target();
        let mut merged: Vec<SearchResult> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut attempted: Vec<String> = Vec::new();
        let mut fallback_occurred = false;

        for name in order {
            if merged.len() >= target {
                break;
            }
            if attempted.iter().any(|a| a == name) {
                continue;
            }
            let Some(strategy) = self.strategy(name) else {
                continue;
            };
            if !self.config.strategy_config(name).enabled {
                debug!(strategy = name, "strategy disabled, skipping");
                continue;
            }
            if !strategy.can_handle(query) {
                continue;
            }
            if !kinds_compatible(strategy, query) {
                debug!(strategy = name, "none of the requested kinds supported, skipping");
                continue;
            }

            match self
                .run_with_recovery(strategy, query, &mut attempted, &mut fallback_occurred)
                .await
            {
                Ok(results) => merge_results(&mut merged, &mut seen, results),
                Err(error) => {
                    warn!(
                        strategy = name,
                        error = %error,
                        "strategy and its fallbacks failed; continuing with partial results"
                    );
                }
            }
        }

        let (mut results, filter_downgraded) = self.apply_filter(query, merged);
        if !filter_downgraded {
            let priorities: HashMap<String, i32> = self
                .strategies
                .iter()
                .map(|s| (s.name().to_string(), s.priority()))
                .collect();
            rank_results(&mut results, &priorities, query);
        }
        let results: Vec<SearchResult> = results
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();

        let response = SearchResponse {
            results,
            strategies_attempted: attempted,
            fallback_occurred,
            filter_downgraded,
            total_time_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            results = response.count(),
            strategies = response.strategies_attempted.len(),
            fallback = response.fallback_occurred,
            elapsed_ms = response.total_time_ms,
            "search complete"
        );
        Ok(response)
    }

    fn strategy(&self, name: &str) -> Option<&dyn SearchStrategy> {
        self.strategies
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    /// Execute one strategy, walking the fallback chain if it fails.
    ///
    /// Every failure is fed to the error tracker; a fallback success marks
    /// the original failure resolved. Strategies already attempted for this
    /// query are never re-run as fallbacks.
    async fn run_with_recovery(
        &self,
        strategy: &dyn SearchStrategy,
        query: &SearchQuery,
        attempted: &mut Vec<String>,
        fallback_occurred: &mut bool,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        attempted.push(strategy.name().to_string());
        let first_error = match self.execute_guarded(strategy, query).await {
            Ok(results) => return Ok(results),
            Err(error) => error,
        };

        let error_id = self.tracker.record(&first_error, query.text.as_str());
        let mut current = strategy.name();
        let mut last_error = first_error;

        while let Some(next_name) = fallback_for(current) {
            if attempted.iter().any(|a| a == next_name) {
                break;
            }
            let Some(next) = self.strategy(next_name) else {
                break;
            };
            if !self.config.strategy_config(next_name).enabled || !next.can_handle(query) {
                break;
            }

            attempted.push(next_name.to_string());
            self.tracker.note_recovery_attempt(&error_id);
            info!(from = current, to = next_name, "falling back");

            match self.execute_guarded(next, query).await {
                Ok(results) => {
                    *fallback_occurred = true;
                    self.tracker.mark_resolved(&error_id);
                    return Ok(results);
                }
                Err(error) => {
                    self.tracker.record(&error, query.text.as_str());
                    last_error = error;
                    current = next_name;
                }
            }
        }
        Err(last_error)
    }

    /// One strategy attempt: breaker admission, timeout race, in-place
    /// retries for recoverable failures.
    async fn execute_guarded(
        &self,
        strategy: &dyn SearchStrategy,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, StrategyError> {
        let name = strategy.name();
        let limits = self.config.strategy_config(name);
        let deadline = limits.timeout();
        let timeout_ms = limits.timeout_ms;
        let breaker = self.breakers.breaker(name);
        let started = Instant::now();

        let should_retry = |error: &StrategyError| {
            // An open breaker will not close within the backoff window.
            if error.kind == StrategyErrorKind::ResourceExhausted {
                return false;
            }
            if error.kind == StrategyErrorKind::Timeout
                && !self.config.orchestrator.retries_timeouts(name)
            {
                return false;
            }
            error.is_recoverable()
        };

        let outcome = retry_with_backoff(&self.config.retry, name, should_retry, || {
            let breaker = Arc::clone(&breaker);
            async move {
                breaker.try_acquire().map_err(|rejection| {
                    StrategyError::resource_exhausted(name, rejection.to_string())
                })?;
                match timeout(deadline, strategy.execute(query, self.store.as_ref())).await {
                    Ok(Ok(results)) => {
                        breaker.record_success();
                        Ok(results)
                    }
                    Ok(Err(error)) => {
                        breaker.record_failure();
                        Err(error)
                    }
                    Err(_) => {
                        breaker.record_failure();
                        Err(StrategyError::timeout(
                            name,
                            format!("no answer within {timeout_ms}ms"),
                        ))
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(mut results) => {
                results.truncate(limits.max_results);
                debug!(
                    strategy = name,
                    results = results.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "strategy succeeded"
                );
                Ok(results)
            }
            Err(error) => {
                warn!(
                    strategy = name,
                    error = %error,
                    query = %query.text,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "strategy failed"
                );
                Err(error)
            }
        }
    }

    /// Parse, optimize, and evaluate the query's filter expression over the
    /// merged results.
    ///
    /// An unusable expression downgrades: the input passes through
    /// untouched and the caller skips ranking, per the degraded-results
    /// contract.
    fn apply_filter(
        &self,
        query: &SearchQuery,
        results: Vec<SearchResult>,
    ) -> (Vec<SearchResult>, bool) {
        let Some(expression) = query.filter_expression.as_deref() else {
            return (results, false);
        };
        if expression.trim().is_empty() {
            return (results, false);
        }

        let parser = FilterParser::with_limits(FilterLimits {
            max_depth: self.config.filter.max_nesting_depth,
            max_children: self.config.filter.max_children_per_node,
        });
        let tree = match parser.parse(expression) {
            Ok(tree) => tree,
            Err(error) => {
                warn!(
                    error = %error,
                    "filter expression rejected; returning unfiltered results"
                );
                return (results, true);
            }
        };
        let optimized = self.optimizer.optimize(&tree);
        let kept = results
            .into_iter()
            .filter(|result| evaluate(&optimized, &result.as_document()))
            .collect();
        (kept, false)
    }
}

/// Substitute strategy tried when `strategy` fails.
///
/// Text search degrades to substring matching, substring to plain recency.
/// Specialist strategies share the generic substring fallback. Recency has
/// nowhere left to go.
fn fallback_for(strategy: &str) -> Option<&'static str> {
    match strategy {
        FULLTEXT => Some(SUBSTRING),
        SUBSTRING => Some(RECENT),
        RECENT => None,
        _ => Some(SUBSTRING),
    }
}

/// First occurrence of an id wins; later strategies cannot replace it.
fn merge_results(
    merged: &mut Vec<SearchResult>,
    seen: &mut HashSet<String>,
    incoming: Vec<SearchResult>,
) {
    for result in incoming {
        if seen.insert(result.id.clone()) {
            merged.push(result);
        }
    }
}

fn kinds_compatible(strategy: &dyn SearchStrategy, query: &SearchQuery) -> bool {
    if query.filters.kinds.is_empty() {
        return true;
    }
    let supported = strategy.supported_kinds();
    query
        .filters
        .kinds
        .iter()
        .any(|kind| supported.contains(kind))
}
