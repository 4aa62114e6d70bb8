//! Rolling failure history across strategies.
//!
//! Every strategy failure lands in a bounded ring buffer with the oldest
//! entry evicted first. Queries over the buffer look at a sliding window
//! (default five minutes) to classify per-strategy error trends and emit
//! operator-facing recommendations.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;
use ulid::Ulid;

use memory_types::{OrchestratorConfig, SharedClock, StrategyError, SystemClock};

/// Default ring capacity.
pub const DEFAULT_ERROR_CAPACITY: usize = 1_000;
/// Default sliding-window width in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 300;

/// Window failure count at which a strategy gets flagged for disabling.
const HEAVY_FAILURE_THRESHOLD: usize = 10;
/// Unresolved non-recoverable failures before a configuration warning.
const NON_RECOVERABLE_THRESHOLD: usize = 3;
/// Minimum window activity before a trend is anything but stable.
const TREND_MIN_SAMPLES: usize = 4;

/// One tracked failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub id: String,
    pub strategy: String,
    pub error: String,
    pub recoverable: bool,
    pub context: String,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    pub recovery_attempts: u32,
}

/// Direction of a strategy's error rate inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorTrend {
    Improving,
    Stable,
    Degrading,
}

/// Window counts for one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyErrorCount {
    pub strategy: String,
    pub errors: usize,
    pub unresolved: usize,
}

/// Aggregate view suitable for structured log fields.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub tracked_total: usize,
    pub window_counts: Vec<StrategyErrorCount>,
}

/// Bounded, clock-driven failure ring.
pub struct ErrorTracker {
    capacity: usize,
    window: Duration,
    clock: SharedClock,
    entries: Mutex<VecDeque<ErrorRecord>>,
}

impl Default for ErrorTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_ERROR_CAPACITY, DEFAULT_WINDOW_SECS)
    }

    pub fn with_settings(capacity: usize, window_secs: u64) -> Self {
        Self::with_clock(capacity, window_secs, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, window_secs: u64, clock: SharedClock) -> Self {
        Self {
            capacity: capacity.max(1),
            window: Duration::seconds(window_secs as i64),
            clock,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn from_config(config: &OrchestratorConfig, clock: SharedClock) -> Self {
        Self::with_clock(config.error_buffer_capacity, config.error_window_secs, clock)
    }

    /// Record a failure and return its tracking id.
    pub fn record(
        &self,
        error: &StrategyError,
        context: impl Into<String>,
    ) -> String {
        let record = ErrorRecord {
            id: Ulid::new().to_string(),
            strategy: error.strategy.clone(),
            error: error.to_string(),
            recoverable: error.is_recoverable(),
            context: context.into(),
            timestamp: self.clock.now(),
            resolved: false,
            recovery_attempts: 0,
        };
        debug!(
            strategy = %record.strategy,
            error = %record.error,
            id = %record.id,
            "tracking strategy failure"
        );

        let id = record.id.clone();
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(record);
        id
    }

    /// Count one recovery attempt against a tracked failure.
    pub fn note_recovery_attempt(&self, id: &str) {
        let mut entries = self.lock();
        if let Some(record) = entries.iter_mut().find(|r| r.id == id) {
            record.recovery_attempts += 1;
        }
    }

    /// Mark a tracked failure as recovered from.
    pub fn mark_resolved(&self, id: &str) {
        let mut entries = self.lock();
        if let Some(record) = entries.iter_mut().find(|r| r.id == id) {
            record.resolved = true;
        }
    }

    /// Failures inside the window, oldest first, optionally per strategy.
    pub fn recent(&self, strategy: Option<&str>) -> Vec<ErrorRecord> {
        let cutoff = self.clock.now() - self.window;
        self.lock()
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .filter(|r| strategy.map_or(true, |s| r.strategy == s))
            .cloned()
            .collect()
    }

    pub fn recent_count(&self, strategy: &str) -> usize {
        self.recent(Some(strategy)).len()
    }

    /// Trend of a strategy's error rate: the newer half of the window
    /// compared against the older half. Low activity always reads stable.
    pub fn trend(&self, strategy: &str) -> ErrorTrend {
        let midpoint = self.clock.now() - self.window / 2;
        let recent = self.recent(Some(strategy));
        if recent.len() < TREND_MIN_SAMPLES {
            return ErrorTrend::Stable;
        }

        let newer = recent.iter().filter(|r| r.timestamp >= midpoint).count();
        let older = recent.len() - newer;
        if newer >= older * 2 {
            ErrorTrend::Degrading
        } else if newer * 2 <= older {
            ErrorTrend::Improving
        } else {
            ErrorTrend::Stable
        }
    }

    /// Operator-facing suggestions derived from window activity.
    pub fn recommendations(&self) -> Vec<String> {
        let mut suggestions = Vec::new();
        for count in self.window_counts() {
            if count.errors >= HEAVY_FAILURE_THRESHOLD {
                suggestions.push(format!(
                    "strategy '{}' failed {} times in the current window; consider disabling it until the backing store recovers",
                    count.strategy, count.errors
                ));
            }
            let non_recoverable = self
                .recent(Some(&count.strategy))
                .iter()
                .filter(|r| !r.recoverable && !r.resolved)
                .count();
            if non_recoverable >= NON_RECOVERABLE_THRESHOLD {
                suggestions.push(format!(
                    "strategy '{}' is failing with non-recoverable errors; check its configuration",
                    count.strategy
                ));
            }
            if self.trend(&count.strategy) == ErrorTrend::Degrading {
                suggestions.push(format!(
                    "error rate for strategy '{}' is rising",
                    count.strategy
                ));
            }
        }
        suggestions
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            tracked_total: self.len(),
            window_counts: self.window_counts(),
        }
    }

    /// Per-strategy counts inside the window, ordered by strategy name.
    pub fn window_counts(&self) -> Vec<StrategyErrorCount> {
        let mut by_strategy: HashMap<String, (usize, usize)> = HashMap::new();
        for record in self.recent(None) {
            let slot = by_strategy.entry(record.strategy).or_default();
            slot.0 += 1;
            if !record.resolved {
                slot.1 += 1;
            }
        }
        let mut counts: Vec<StrategyErrorCount> = by_strategy
            .into_iter()
            .map(|(strategy, (errors, unresolved))| StrategyErrorCount {
                strategy,
                errors,
                unresolved,
            })
            .collect();
        counts.sort_by(|a, b| a.strategy.cmp(&b.strategy));
        counts
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ErrorRecord>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use memory_types::ManualClock;

    fn setup(capacity: usize) -> (Arc<ManualClock>, ErrorTracker) {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let tracker =
            ErrorTracker::with_clock(capacity, DEFAULT_WINDOW_SECS, clock.clone() as SharedClock);
        (clock, tracker)
    }

    fn lock_error(strategy: &str) -> StrategyError {
        StrategyError::internal(strategy, "database is locked")
    }

    fn syntax_error(strategy: &str) -> StrategyError {
        StrategyError::internal(strategy, "syntax error in generated query")
    }

    #[test]
    fn ring_evicts_oldest_when_full() {
        let (_, tracker) = setup(3);
        for index in 0..5 {
            tracker.record(&lock_error("recent"), format!("query {index}"));
        }
        assert_eq!(tracker.len(), 3);
        let contexts: Vec<String> = tracker
            .recent(None)
            .into_iter()
            .map(|r| r.context)
            .collect();
        assert_eq!(contexts, vec!["query 2", "query 3", "query 4"]);
    }

    #[test]
    fn window_excludes_old_failures() {
        let (clock, tracker) = setup(100);
        tracker.record(&lock_error("fulltext"), "old");
        clock.advance(Duration::seconds(301));
        tracker.record(&lock_error("fulltext"), "new");

        let recent = tracker.recent(Some("fulltext"));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].context, "new");
        // The ring itself still holds both.
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn recent_filters_by_strategy() {
        let (_, tracker) = setup(100);
        tracker.record(&lock_error("fulltext"), "a");
        tracker.record(&lock_error("substring"), "b");
        assert_eq!(tracker.recent_count("fulltext"), 1);
        assert_eq!(tracker.recent_count("substring"), 1);
        assert_eq!(tracker.recent(None).len(), 2);
    }

    #[test]
    fn resolution_and_recovery_attempts_update_by_id() {
        let (_, tracker) = setup(100);
        let id = tracker.record(&lock_error("fulltext"), "q");
        tracker.note_recovery_attempt(&id);
        tracker.note_recovery_attempt(&id);
        tracker.mark_resolved(&id);

        let record = tracker.recent(None).remove(0);
        assert_eq!(record.recovery_attempts, 2);
        assert!(record.resolved);
        assert!(record.recoverable);
    }

    #[test]
    fn trend_reads_degrading_when_errors_cluster_late() {
        let (clock, tracker) = setup(100);
        tracker.record(&lock_error("fulltext"), "early");
        clock.advance(Duration::seconds(200));
        for _ in 0..4 {
            tracker.record(&lock_error("fulltext"), "late");
        }
        assert_eq!(tracker.trend("fulltext"), ErrorTrend::Degrading);
    }

    #[test]
    fn trend_reads_improving_when_errors_taper_off() {
        let (clock, tracker) = setup(100);
        for _ in 0..4 {
            tracker.record(&lock_error("fulltext"), "early");
        }
        clock.advance(Duration::seconds(200));
        tracker.record(&lock_error("fulltext"), "late");
        assert_eq!(tracker.trend("fulltext"), ErrorTrend::Improving);
    }

    #[test]
    fn sparse_activity_is_stable() {
        let (_, tracker) = setup(100);
        tracker.record(&lock_error("fulltext"), "only");
        assert_eq!(tracker.trend("fulltext"), ErrorTrend::Stable);
        assert_eq!(tracker.trend("never-failed"), ErrorTrend::Stable);
    }

    #[test]
    fn heavy_failures_produce_a_disable_recommendation() {
        let (_, tracker) = setup(100);
        for index in 0..10 {
            tracker.record(&lock_error("semantic"), format!("q{index}"));
        }
        let suggestions = tracker.recommendations();
        assert!(suggestions.iter().any(|s| s.contains("'semantic'")));
        assert!(suggestions.iter().any(|s| s.contains("disabling")));
    }

    #[test]
    fn unresolved_non_recoverable_errors_flag_configuration() {
        let (_, tracker) = setup(100);
        for _ in 0..3 {
            tracker.record(&syntax_error("metadata"), "q");
        }
        let suggestions = tracker.recommendations();
        assert!(suggestions.iter().any(|s| s.contains("check its configuration")));
    }

    #[test]
    fn quiet_tracker_recommends_nothing() {
        let (_, tracker) = setup(100);
        tracker.record(&lock_error("recent"), "q");
        assert!(tracker.recommendations().is_empty());
    }

    #[test]
    fn snapshot_counts_by_strategy() {
        let (_, tracker) = setup(100);
        tracker.record(&lock_error("fulltext"), "a");
        tracker.record(&lock_error("fulltext"), "b");
        let id = tracker.record(&syntax_error("substring"), "c");
        tracker.mark_resolved(&id);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.tracked_total, 3);
        assert_eq!(
            snapshot.window_counts,
            vec![
                StrategyErrorCount {
                    strategy: "fulltext".to_string(),
                    errors: 2,
                    unresolved: 2,
                },
                StrategyErrorCount {
                    strategy: "substring".to_string(),
                    errors: 1,
                    unresolved: 0,
                },
            ]
        );
    }
}
