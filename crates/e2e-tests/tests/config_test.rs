//! E2E tests for layered configuration loading and live reconfiguration.
//!
//! Loading precedence is defaults, then config file, then environment,
//! and a configuration that fails validation is rejected wholesale.

use anyhow::Result;
use pretty_assertions::assert_eq;

use e2e_tests::TestHarness;
use memory_orchestrator::SEMANTIC;
use memory_types::{ConfigError, EngineConfig, SearchQuery};

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

/// Walks the whole precedence chain in one test so the environment
/// mutation stays sequential within this binary.
#[test]
fn layered_loading_follows_precedence() -> Result<()> {
    // 1. No file, no environment: the built-in defaults come back.
    let defaults = EngineConfig::load(None)?;
    assert_eq!(defaults, EngineConfig::default());

    // 2. An explicit file overrides only the keys it names.
    let from_file = EngineConfig::load(Some(&fixture("engine.toml")))?;
    assert_eq!(from_file.circuit_breaker.failure_threshold, 3);
    assert_eq!(from_file.retry.max_retries, 4);
    assert_eq!(from_file.strategy.timeout_ms, 2500);
    assert_eq!(from_file.strategy.max_results, 50, "untouched key keeps its default");
    assert_eq!(from_file.orchestrator.timeout_retryable, vec!["recent".to_string()]);

    // 3. Per-strategy overrides resolve through strategy_config; strategies
    //    without one inherit the baseline.
    let semantic = from_file.strategy_config("semantic");
    assert!(!semantic.enabled);
    assert_eq!(semantic.timeout_ms, 8000);
    assert_eq!(semantic.max_results, 50);
    assert_eq!(from_file.strategy_config("fulltext").timeout_ms, 2500);

    // 4. Environment beats the file. Clean up before asserting so a
    //    failure cannot leak the variable into other tests.
    std::env::set_var("MEMORY_QUERY__RETRY__MAX_RETRIES", "6");
    let layered = EngineConfig::load(Some(&fixture("engine.toml")));
    std::env::remove_var("MEMORY_QUERY__RETRY__MAX_RETRIES");
    let layered = layered?;
    assert_eq!(layered.retry.max_retries, 6);
    assert_eq!(layered.circuit_breaker.failure_threshold, 3);

    Ok(())
}

/// A file that parses but fails validation is rejected with the failing
/// section named.
#[test]
fn invalid_files_are_rejected_as_a_whole() {
    let error = EngineConfig::load(Some(&fixture("invalid-engine.toml"))).unwrap_err();
    assert!(matches!(error, ConfigError::Invalid(_)));
    assert!(
        error.to_string().contains("circuit_breaker: failure_threshold must be > 0"),
        "unexpected message: {error}"
    );
}

/// A missing explicit file is a load error, not a silent fallback.
#[test]
fn missing_explicit_files_are_load_errors() {
    let error = EngineConfig::load(Some(&fixture("no-such-file.toml"))).unwrap_err();
    assert!(matches!(error, ConfigError::Load(_)));
}

/// Reconfiguring an engine from a loaded file changes which strategies
/// run: the fixture disables the similarity strategy.
#[tokio::test]
async fn reconfiguration_changes_strategy_selection() -> Result<()> {
    let harness = TestHarness::with_sample_memories();
    let mut engine = harness.engine();
    let query = SearchQuery::text("why did the deploy fail because of the certificate");

    let before = engine.search(&query).await?;
    assert!(
        before.strategies_attempted.iter().any(|s| s == SEMANTIC),
        "complex queries run the similarity strategy by default"
    );

    engine.reconfigure(EngineConfig::load(Some(&fixture("engine.toml")))?)?;
    assert_eq!(engine.config().circuit_breaker.failure_threshold, 3);

    let after = engine.search(&query).await?;
    assert!(
        after.strategies_attempted.iter().all(|s| s != SEMANTIC),
        "the fixture disables the similarity strategy"
    );
    Ok(())
}
