//! End-to-end test infrastructure for memory-query.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering the full search pipeline from seeded store to ranked response.

use std::sync::{Arc, Once};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use memory_orchestrator::{
    InMemoryStore, MemoryStore, SearchOrchestrator, SearchResponse, SearchStrategy,
};
use memory_types::{EngineConfig, ManualClock, MemoryKind, MemoryRecord, SharedClock};

/// Install a tracing subscriber once per test binary.
///
/// Honors `RUST_LOG`; quiet by default so test output stays readable.
/// Safe to call from every test.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Fixed "now" shared by every harness so age-sensitive behavior is
/// reproducible.
pub fn harness_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
}

/// Default engine configuration with retry pacing tightened so failure
/// paths finish in milliseconds instead of sleeping through real backoff.
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 2;
    config
}

/// Shared test harness for E2E tests.
///
/// Provides a seedable store, a controllable clock, and builders for
/// orchestrators wired over both.
pub struct TestHarness {
    /// Store backing every engine the harness builds.
    pub store: Arc<InMemoryStore>,
    /// Clock shared with the engines; advance it to cross breaker windows.
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    /// Empty store, clock frozen at [`harness_now`].
    pub fn new() -> Self {
        init_tracing();
        Self {
            store: Arc::new(InMemoryStore::new()),
            clock: Arc::new(ManualClock::new(harness_now())),
        }
    }

    /// Harness whose store holds the shared [`sample_memories`] set.
    pub fn with_sample_memories() -> Self {
        let harness = Self::new();
        for record in sample_memories(harness_now()) {
            harness.store.insert(record);
        }
        harness
    }

    /// Engine over the harness store with the default strategy set and
    /// production-default configuration.
    pub fn engine(&self) -> SearchOrchestrator {
        self.engine_with(EngineConfig::default())
    }

    /// Engine over the harness store with a custom configuration.
    pub fn engine_with(&self, config: EngineConfig) -> SearchOrchestrator {
        self.engine_over(Arc::clone(&self.store) as Arc<dyn MemoryStore>, config)
    }

    /// Engine over an arbitrary store, sharing the harness clock.
    pub fn engine_over(
        &self,
        store: Arc<dyn MemoryStore>,
        config: EngineConfig,
    ) -> SearchOrchestrator {
        SearchOrchestrator::with_clock(store, config, self.shared_clock())
    }

    /// Engine over the harness store with a caller-supplied strategy set.
    pub fn engine_with_strategies(
        &self,
        config: EngineConfig,
        strategies: Vec<Box<dyn SearchStrategy>>,
    ) -> SearchOrchestrator {
        SearchOrchestrator::with_strategies(
            Arc::clone(&self.store) as Arc<dyn MemoryStore>,
            config,
            self.shared_clock(),
            strategies,
        )
    }

    /// The harness clock as the trait object the engine APIs take.
    pub fn shared_clock(&self) -> SharedClock {
        Arc::clone(&self.clock) as SharedClock
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Ids of a response's results, in rank order.
pub fn result_ids(response: &SearchResponse) -> Vec<String> {
    response.results.iter().map(|r| r.id.clone()).collect()
}

/// Fixed memory set shared by the pipeline-level tests.
///
/// Spread across kinds, categories, ages, and metadata so every strategy
/// has something to find. Timestamps are relative to `now`; four of the
/// records mention "billing" so text queries have a known answer set.
pub fn sample_memories(now: DateTime<Utc>) -> Vec<MemoryRecord> {
    vec![
        MemoryRecord::new(
            "mem-001",
            "Production database credentials rotated; the new secret lives in the vault",
            MemoryKind::Essential,
            now - Duration::days(40),
        )
        .with_metadata_entry("category", json!("security"))
        .with_metadata_entry("importance", json!(10)),
        MemoryRecord::new(
            "mem-002",
            "Team decided to ship the billing rewrite behind a feature flag",
            MemoryKind::Essential,
            now - Duration::days(12),
        )
        .with_metadata_entry("category", json!("work"))
        .with_metadata_entry("importance", json!(8))
        .with_metadata_entry("confidenceScore", json!(0.9)),
        MemoryRecord::new(
            "mem-003",
            "Standup covered the billing rollout checklist and two open bugs",
            MemoryKind::Conversational,
            now - Duration::days(2),
        )
        .with_metadata_entry("category", json!("work"))
        .with_metadata_entry("importance", json!(4))
        .with_metadata_entry("confidenceScore", json!(0.7)),
        MemoryRecord::new(
            "mem-004",
            "Pick up oat milk on the way home",
            MemoryKind::Conversational,
            now - Duration::hours(6),
        )
        .with_metadata_entry("category", json!("home"))
        .with_metadata_entry("importance", json!(2)),
        MemoryRecord::new(
            "mem-005",
            "Runbook: restart billing workers one at a time so queues drain",
            MemoryKind::Reference,
            now - Duration::days(30),
        )
        .with_metadata_entry("category", json!("engineering"))
        .with_metadata_entry("importance", json!(6)),
        MemoryRecord::new(
            "mem-006",
            "Style guide: error messages must name the failing field",
            MemoryKind::Reference,
            now - Duration::days(90),
        )
        .with_metadata_entry("category", json!("engineering"))
        .with_metadata_entry("importance", json!(5)),
        MemoryRecord::new(
            "mem-007",
            "Legacy billing system decommissioned after the migration",
            MemoryKind::Archival,
            now - Duration::days(200),
        )
        .with_metadata_entry("category", json!("work"))
        .with_metadata_entry("importance", json!(1)),
        MemoryRecord::new(
            "mem-008",
            "Agreed to revisit vault access policy next sprint",
            MemoryKind::Conversational,
            now - Duration::hours(30),
        )
        .with_metadata_entry("category", json!("work"))
        .with_metadata_entry("importance", json!(5))
        .with_metadata_entry("confidenceScore", json!(0.6)),
    ]
}

/// Create `count` records with sequential timestamps, oldest first.
///
/// Ids are `rec-000` style, content embeds the index, kinds alternate
/// between conversational and reference, and categories cycle through
/// work / home / lab so category filters select a predictable third.
pub fn create_test_records(count: usize, base_text: &str) -> Vec<MemoryRecord> {
    let base = harness_now() - Duration::seconds(count as i64);
    (0..count)
        .map(|i| {
            let kind = if i % 2 == 0 {
                MemoryKind::Conversational
            } else {
                MemoryKind::Reference
            };
            let category = ["work", "home", "lab"][i % 3];
            MemoryRecord::new(
                format!("rec-{i:03}"),
                format!("{base_text} (note {i})"),
                kind,
                base + Duration::seconds(i as i64),
            )
            .with_metadata_entry("category", json!(category))
            .with_metadata_entry("sequence", json!(i))
        })
        .collect()
}
