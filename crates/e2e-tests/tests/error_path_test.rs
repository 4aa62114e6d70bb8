//! E2E tests for error surfaces and hostile inputs.
//!
//! Invalid queries are the only thing a search call may fail with;
//! everything else degrades. These tests pin the validation messages,
//! edge inputs around the limits, and how non-recoverable strategy
//! failures skip retries but still fall back.

use std::sync::atomic::Ordering;

use pretty_assertions::assert_eq;

use e2e_tests::{fast_config, harness_now, result_ids, TestHarness};
use memory_orchestrator::{ScriptedStrategy, SearchError, FULLTEXT, SUBSTRING};
use memory_types::{QueryFilters, SearchQuery, StrategyError, MAX_LIMIT, MAX_QUERY_LENGTH};

/// Malformed pagination is rejected before any strategy runs.
#[tokio::test]
async fn invalid_limits_are_rejected_with_named_reasons() {
    let harness = TestHarness::with_sample_memories();
    let engine = harness.engine();

    let error = engine
        .search(&SearchQuery::text("billing").with_limit(0))
        .await
        .unwrap_err();
    assert!(matches!(error, SearchError::Validation(_)));
    assert!(error.to_string().contains("limit must be greater than zero"));

    let error = engine
        .search(&SearchQuery::text("billing").with_limit(MAX_LIMIT + 1))
        .await
        .unwrap_err();
    assert!(error.to_string().contains("limit 501 exceeds maximum of 500"));
}

/// Over-long query text is rejected; text at the boundary is accepted.
#[tokio::test]
async fn query_length_is_enforced_at_the_boundary() {
    let harness = TestHarness::with_sample_memories();
    let engine = harness.engine();

    let at_limit = "a".repeat(MAX_QUERY_LENGTH);
    assert!(engine.search(&SearchQuery::text(at_limit)).await.is_ok());

    let over_limit = "a".repeat(MAX_QUERY_LENGTH + 1);
    let error = engine
        .search(&SearchQuery::text(over_limit))
        .await
        .unwrap_err();
    assert!(error.to_string().contains("query text exceeds 1000 bytes"));
}

/// An inverted time range can never match anything, so it is an error
/// instead of a silent empty answer.
#[tokio::test]
async fn inverted_time_ranges_are_rejected() {
    let harness = TestHarness::with_sample_memories();
    let engine = harness.engine();

    let filters = QueryFilters {
        created_after: Some(harness_now()),
        created_before: Some(harness_now() - chrono::Duration::days(1)),
        ..QueryFilters::default()
    };
    let error = engine
        .search(&SearchQuery::text("billing").with_filters(filters))
        .await
        .unwrap_err();
    assert!(error
        .to_string()
        .contains("created_after must not be later than created_before"));
}

/// Paging past the end of the result set is not an error.
#[tokio::test]
async fn offsets_past_the_result_set_return_empty_pages() {
    let harness = TestHarness::with_sample_memories();
    let engine = harness.engine();

    let response = engine
        .search(&SearchQuery::text("billing").with_offset(100))
        .await
        .unwrap();
    assert!(!response.has_results());
}

/// Expressions over fields no record carries parse fine and match
/// nothing; that is not a downgrade.
#[tokio::test]
async fn unknown_fields_match_nothing_without_downgrading() {
    let harness = TestHarness::with_sample_memories();
    let engine = harness.engine();

    let response = engine
        .search(&SearchQuery::default().with_filter_expression("flavor = vanilla"))
        .await
        .unwrap();
    assert_eq!(response.count(), 0);
    assert!(!response.filter_downgraded);
}

/// An empty store answers every query shape cleanly.
#[tokio::test]
async fn empty_stores_answer_cleanly() {
    let harness = TestHarness::new();
    let engine = harness.engine();

    for query in [
        SearchQuery::default(),
        SearchQuery::text("anything"),
        SearchQuery::default().with_filter_expression("importance > 5"),
    ] {
        let response = engine.search(&query).await.unwrap();
        assert!(!response.has_results());
    }
    assert_eq!(engine.diagnostics().errors.tracked_total, 0);
}

/// Non-recoverable strategy failures skip the retry loop entirely but
/// still hand the query to the fallback chain.
#[tokio::test]
async fn non_recoverable_failures_fall_back_without_retrying() {
    let harness = TestHarness::new();
    let broken = ScriptedStrategy::new(FULLTEXT)
        .always_failing(StrategyError::internal(FULLTEXT, "search index is corrupt"));
    let calls = broken.call_handle();
    let fallback = ScriptedStrategy::new(SUBSTRING)
        .with_results(vec![ScriptedStrategy::result("fb-1", 0.4, SUBSTRING)]);
    let engine =
        harness.engine_with_strategies(fast_config(), vec![Box::new(broken), Box::new(fallback)]);

    let response = engine.search(&SearchQuery::text("billing")).await.unwrap();

    assert_eq!(result_ids(&response), vec!["fb-1"]);
    assert!(response.fallback_occurred);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "no retries for corrupt-index failures");

    let tracked = engine.tracker().recent(Some(FULLTEXT));
    assert_eq!(tracked.len(), 1);
    assert!(!tracked[0].recoverable);
    assert!(tracked[0].resolved, "the fallback answered for it");
}
