//! Retrieval strategies and the trait they all implement.
//!
//! Each strategy knows one way of finding records: term overlap, recency,
//! category membership, metadata constraints, time windows. The orchestrator
//! decides which strategies run and in what order; a strategy only reports
//! whether it can serve a query shape and turns store records into scored
//! results.

mod category;
mod fulltext;
mod metadata;
mod mock;
mod recent;
mod semantic;
mod substring;
mod temporal;

pub use category::CategoryStrategy;
pub use fulltext::FullTextStrategy;
pub use metadata::MetadataStrategy;
pub use mock::ScriptedStrategy;
pub use recent::RecentStrategy;
pub use semantic::SemanticStrategy;
pub use substring::SubstringStrategy;
pub use temporal::TemporalStrategy;

pub(crate) use category::CATEGORY_KEYWORDS;
pub(crate) use metadata::METADATA_KEYWORDS;
pub(crate) use semantic::is_complex;
pub(crate) use temporal::TEMPORAL_KEYWORDS;

use std::sync::Arc;

use async_trait::async_trait;

use memory_filter::{evaluate, FilterNode};
use memory_planner::{PlanExecutor, QueryPlanner, QueryRoute, QueryRouter, SelectivityEstimator};
use memory_types::{
    MemoryKind, MemoryRecord, QueryFilters, SearchQuery, SearchResult, SharedClock,
    StrategyConfig, StrategyError,
};

use crate::store::MemoryStore;

/// Names under which the standard strategies register.
pub const RECENT: &str = "recent";
pub const FULLTEXT: &str = "fulltext";
pub const SUBSTRING: &str = "substring";
pub const CATEGORY: &str = "category";
pub const TEMPORAL: &str = "temporal";
pub const METADATA: &str = "metadata";
pub const SEMANTIC: &str = "semantic";

/// One way of retrieving records for a query.
///
/// Implementations must be cheap to construct and safe to call concurrently;
/// all per-query state lives in the arguments.
///
/// # Example
///
/// ```rust,ignore
/// use memory_orchestrator::{MemoryStore, SearchStrategy};
/// use memory_types::{SearchQuery, SearchResult, StrategyError};
///
/// struct VectorStrategy { /* index handle */ }
///
/// #[async_trait::async_trait]
/// impl SearchStrategy for VectorStrategy {
///     fn name(&self) -> &'static str {
///         "vector"
///     }
///     fn priority(&self) -> i32 {
///         9
///     }
///     fn can_handle(&self, query: &SearchQuery) -> bool {
///         !query.has_empty_text()
///     }
///     async fn execute(
///         &self,
///         query: &SearchQuery,
///         store: &dyn MemoryStore,
///     ) -> Result<Vec<SearchResult>, StrategyError> {
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Stable name used for configuration, breakers, and result attribution.
    fn name(&self) -> &'static str;

    /// Ranking weight. Higher-priority strategies boost their results more.
    fn priority(&self) -> i32;

    /// Whether this strategy can produce anything useful for `query`.
    fn can_handle(&self, query: &SearchQuery) -> bool;

    /// Record kinds this strategy indexes. Defaults to all kinds.
    fn supported_kinds(&self) -> Vec<MemoryKind> {
        MemoryKind::all().to_vec()
    }

    /// Apply a configuration update. The orchestrator validates the config
    /// before calling this, so implementations may take it at face value.
    fn reconfigure(&mut self, config: &StrategyConfig) {
        let _ = config;
    }

    /// Run the strategy against the store and return scored results.
    async fn execute(
        &self,
        query: &SearchQuery,
        store: &dyn MemoryStore,
    ) -> Result<Vec<SearchResult>, StrategyError>;
}

/// Build the standard strategy set.
///
/// Strategies that evaluate filter trees share `estimator` so selectivity
/// observations accumulate in one cache; `clock` feeds the temporal
/// strategy's keyword windows.
pub fn default_strategies(
    estimator: &Arc<SelectivityEstimator>,
    clock: SharedClock,
) -> Vec<Box<dyn SearchStrategy>> {
    vec![
        Box::new(FullTextStrategy::new()),
        Box::new(SemanticStrategy::new()),
        Box::new(CategoryStrategy::new(Arc::clone(estimator))),
        Box::new(MetadataStrategy::new(Arc::clone(estimator))),
        Box::new(TemporalStrategy::with_clock(clock)),
        Box::new(RecentStrategy::new()),
        Box::new(SubstringStrategy::new()),
    ]
}

/// Records a strategy should fetch: enough to cover the query's offset and
/// limit, capped by the strategy's configured ceiling.
pub(crate) fn fetch_budget(query: &SearchQuery, max_results: usize) -> usize {
    query.collection_target().clamp(1, max_results.max(1))
}

/// Whether `record` satisfies every structured filter on the query.
///
/// Strategies select candidates by their own facet and then run all facets
/// through this, so merged results agree regardless of which strategy
/// produced them.
pub(crate) fn passes_filters(record: &MemoryRecord, filters: &QueryFilters) -> bool {
    if !filters.matches_kind(record.kind) {
        return false;
    }
    if !filters.categories.is_empty() {
        let matched = record
            .category()
            .map_or(false, |category| filters.categories.iter().any(|c| c == category));
        if !matched {
            return false;
        }
    }
    if let Some(after) = filters.created_after {
        if record.created_at < after {
            return false;
        }
    }
    if let Some(before) = filters.created_before {
        if record.created_at > before {
            return false;
        }
    }
    filters
        .metadata
        .iter()
        .all(|(key, expected)| record.metadata.get(key) == Some(expected))
}

/// Whole-word, case-insensitive keyword test over free text.
pub(crate) fn contains_keyword(text: &str, keywords: &[&str]) -> bool {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .any(|word| keywords.iter().any(|keyword| word.eq_ignore_ascii_case(keyword)))
}

/// Filter-tree execution shared by the structured strategies.
///
/// Routes a tree to backend pushdown when the router chooses it, otherwise
/// plans the tree and runs the staged executor over a full scan. Both paths
/// may over-admit (lowered LIKE approximations, early termination), so
/// survivors are re-checked exactly before being returned.
pub(crate) struct FilterPipeline {
    planner: QueryPlanner,
    router: QueryRouter,
    executor: PlanExecutor,
}

impl FilterPipeline {
    pub(crate) fn new(estimator: Arc<SelectivityEstimator>) -> Self {
        Self {
            planner: QueryPlanner::new(Arc::clone(&estimator)),
            router: QueryRouter::new(estimator),
            executor: PlanExecutor::new(),
        }
    }

    /// Records matching `tree`, at most `limit` of them, in store order.
    pub(crate) async fn candidates(
        &self,
        strategy: &str,
        store: &dyn MemoryStore,
        tree: &FilterNode,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StrategyError> {
        let total = store
            .count()
            .await
            .map_err(|e| StrategyError::from_store(strategy, &e))?;

        let route = self
            .router
            .choose(tree, total, store.supports_lowered_queries());
        if let QueryRoute::Lowered(lowered) = route {
            let pushed = store
                .search_lowered(&lowered, limit)
                .await
                .map_err(|e| StrategyError::from_store(strategy, &e))?;
            return Ok(pushed
                .into_iter()
                .filter(|record| evaluate(tree, &record.as_document()))
                .take(limit)
                .collect());
        }

        let records = store
            .scan()
            .await
            .map_err(|e| StrategyError::from_store(strategy, &e))?;
        let documents: Vec<serde_json::Value> =
            records.iter().map(MemoryRecord::as_document).collect();
        let plan = self.planner.plan(tree);
        let survivors = self.executor.execute(&plan, &documents);

        Ok(survivors
            .into_iter()
            .filter(|&index| evaluate(tree, &documents[index]))
            .map(|index| records[index].clone())
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::{TimeZone, Utc};
    use memory_filter::ComparisonOperator;
    use serde_json::json;

    fn record(id: &str, kind: MemoryKind, category: &str) -> MemoryRecord {
        MemoryRecord::new(
            id,
            "content",
            kind,
            Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
        )
        .with_metadata_entry("category", json!(category))
    }

    #[test]
    fn fetch_budget_covers_offset_up_to_the_ceiling() {
        let query = SearchQuery::text("x").with_limit(10).with_offset(5);
        assert_eq!(fetch_budget(&query, 50), 15);
        assert_eq!(fetch_budget(&query, 8), 8);
        assert_eq!(fetch_budget(&query, 0), 1);
    }

    #[test]
    fn structured_filters_check_every_facet() {
        let record = record("a", MemoryKind::Essential, "work")
            .with_metadata_entry("priority", json!(5));

        let mut filters = QueryFilters::default();
        assert!(passes_filters(&record, &filters));

        filters.kinds = vec![MemoryKind::Archival];
        assert!(!passes_filters(&record, &filters));
        filters.kinds = vec![MemoryKind::Essential];

        filters.categories = vec!["home".into()];
        assert!(!passes_filters(&record, &filters));
        filters.categories = vec!["work".into()];

        filters.metadata.insert("priority".into(), json!(5));
        assert!(passes_filters(&record, &filters));
        filters.metadata.insert("priority".into(), json!(9));
        assert!(!passes_filters(&record, &filters));
    }

    #[test]
    fn keyword_matching_ignores_case_and_punctuation() {
        assert!(contains_keyword("What KIND of notes?", &["kind"]));
        assert!(contains_keyword("tagged, apparently", &["tagged"]));
        // Substrings of longer words do not count.
        assert!(!contains_keyword("unkindly worded", &["kind"]));
    }

    #[test]
    fn temporal_window_is_inclusive() {
        let record = record("a", MemoryKind::Conversational, "work");
        let filters = QueryFilters {
            created_after: Some(record.created_at),
            created_before: Some(record.created_at),
            ..QueryFilters::default()
        };
        assert!(passes_filters(&record, &filters));
    }

    #[tokio::test]
    async fn pipeline_returns_exact_matches_from_a_scan() {
        let store = InMemoryStore::with_records(vec![
            record("a", MemoryKind::Essential, "work"),
            record("b", MemoryKind::Essential, "home"),
            record("c", MemoryKind::Archival, "work"),
        ]);
        let pipeline = FilterPipeline::new(Arc::new(SelectivityEstimator::new()));
        let tree = FilterNode::comparison("category", ComparisonOperator::Eq, "work");

        let hits = pipeline
            .candidates("category", &store, &tree, 10)
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn pipeline_honors_the_limit() {
        let store = InMemoryStore::with_records(vec![
            record("a", MemoryKind::Essential, "work"),
            record("b", MemoryKind::Essential, "work"),
        ]);
        let pipeline = FilterPipeline::new(Arc::new(SelectivityEstimator::new()));
        let tree = FilterNode::comparison("category", ComparisonOperator::Eq, "work");

        let hits = pipeline
            .candidates("category", &store, &tree, 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
