//! Per-strategy circuit breakers.
//!
//! One breaker guards each strategy name. Failures increment a counter;
//! crossing the threshold opens the circuit and schedules a recovery
//! deadline. While open, calls are rejected without touching the guarded
//! operation. Once the deadline passes, exactly one probe is admitted:
//! success closes the circuit and resets the counter, failure re-opens it
//! with a fresh deadline.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use memory_types::{CircuitBreakerConfig, SharedClock, SystemClock};

/// Rejection raised without invoking the guarded operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker for strategy '{strategy}' is open until {retry_at}")]
pub struct CircuitOpen {
    pub strategy: String,
    pub retry_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one breaker, for logging and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub strategy: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub next_attempt_time: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct BreakerInner {
    failure_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    state: CircuitState,
    next_attempt_time: Option<DateTime<Utc>>,
}

/// Failure-threshold circuit breaker for a single strategy.
pub struct CircuitBreaker {
    strategy: String,
    config: CircuitBreakerConfig,
    clock: SharedClock,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(strategy: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(strategy, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        strategy: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                failure_count: 0,
                last_failure_time: None,
                state: CircuitState::Closed,
                next_attempt_time: None,
            }),
        }
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Ask permission to run the guarded operation.
    ///
    /// Transitions open circuits to half-open when the recovery deadline
    /// has passed; while half-open, the single admitted probe must resolve
    /// via [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure) before another call gets
    /// through.
    pub fn try_acquire(&self) -> Result<(), CircuitOpen> {
        let now = self.clock.now();
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => Err(self.rejection(&inner, now)),
            CircuitState::Open => {
                let deadline_passed = inner.next_attempt_time.is_some_and(|at| now >= at);
                if deadline_passed {
                    inner.state = CircuitState::HalfOpen;
                    debug!(strategy = %self.strategy, "circuit half-open, admitting probe");
                    Ok(())
                } else {
                    Err(self.rejection(&inner, now))
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!(strategy = %self.strategy, "circuit closed after successful call");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.next_attempt_time = None;
    }

    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.failure_count += 1;
        inner.last_failure_time = Some(now);

        let should_open = inner.state == CircuitState::HalfOpen
            || inner.failure_count >= self.config.failure_threshold;
        if should_open {
            let retry_at = now + self.config.recovery_timeout();
            inner.state = CircuitState::Open;
            inner.next_attempt_time = Some(retry_at);
            warn!(
                strategy = %self.strategy,
                failures = inner.failure_count,
                retry_at = %retry_at,
                "circuit opened"
            );
        }
    }

    /// Current state, reporting `HalfOpen` for an open circuit whose
    /// recovery deadline has already passed.
    pub fn state(&self) -> CircuitState {
        let now = self.clock.now();
        let inner = self.lock();
        match inner.state {
            CircuitState::Open if inner.next_attempt_time.is_some_and(|at| now >= at) => {
                CircuitState::HalfOpen
            }
            state => state,
        }
    }

    /// Whether a call made right now would be rejected.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state();
        let inner = self.lock();
        BreakerSnapshot {
            strategy: self.strategy.clone(),
            state,
            failure_count: inner.failure_count,
            last_failure_time: inner.last_failure_time,
            next_attempt_time: inner.next_attempt_time,
        }
    }

    fn rejection(&self, inner: &BreakerInner, now: DateTime<Utc>) -> CircuitOpen {
        CircuitOpen {
            strategy: self.strategy.clone(),
            retry_at: inner.next_attempt_time.unwrap_or(now),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Lazily-populated breaker table, one entry per strategy name.
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    clock: SharedClock,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the breaker for `strategy`, creating it on first use.
    pub fn breaker(&self, strategy: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(breakers.entry(strategy.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::with_clock(
                strategy,
                self.config.clone(),
                Arc::clone(&self.clock),
            ))
        }))
    }

    /// Snapshots of every breaker created so far, ordered by strategy name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        let mut snapshots: Vec<BreakerSnapshot> =
            breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.strategy.cmp(&b.strategy));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.breakers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use memory_types::ManualClock;

    fn setup() -> (Arc<ManualClock>, CircuitBreaker) {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let breaker = CircuitBreaker::with_clock(
            "fulltext",
            CircuitBreakerConfig::default(),
            clock.clone() as SharedClock,
        );
        (clock, breaker)
    }

    #[test]
    fn closed_breaker_admits_calls() {
        let (_, breaker) = setup();
        assert!(breaker.try_acquire().is_ok());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn opens_after_exactly_threshold_failures() {
        let (_, breaker) = setup();
        for _ in 0..4 {
            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Closed);
            assert!(breaker.try_acquire().is_ok());
        }

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        let err = breaker.try_acquire().unwrap_err();
        assert_eq!(err.strategy, "fulltext");
    }

    #[test]
    fn success_resets_the_failure_counter() {
        let (_, breaker) = setup();
        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);

        // A full threshold of fresh failures is needed to open again.
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn recovery_deadline_admits_exactly_one_probe() {
        let (clock, breaker) = setup();
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.try_acquire().is_err());

        clock.advance(Duration::seconds(30));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire().is_ok());
        // The probe is still in flight.
        assert!(breaker.try_acquire().is_err());
    }

    #[test]
    fn probe_success_closes_the_circuit() {
        let (clock, breaker) = setup();
        for _ in 0..5 {
            breaker.record_failure();
        }
        clock.advance(Duration::seconds(30));
        assert!(breaker.try_acquire().is_ok());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn probe_failure_reopens_and_reschedules() {
        let (clock, breaker) = setup();
        for _ in 0..5 {
            breaker.record_failure();
        }
        clock.advance(Duration::seconds(30));
        assert!(breaker.try_acquire().is_ok());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire().is_err());

        // The new deadline starts from the probe failure.
        clock.advance(Duration::seconds(29));
        assert!(breaker.try_acquire().is_err());
        clock.advance(Duration::seconds(1));
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn registry_reuses_one_breaker_per_name() {
        let registry = BreakerRegistry::new(CircuitBreakerConfig::default());
        let first = registry.breaker("recent");
        let again = registry.breaker("recent");
        let other = registry.breaker("fulltext");

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);

        first.record_failure();
        assert_eq!(again.failure_count(), 1);
        assert_eq!(other.failure_count(), 0);
    }

    #[test]
    fn snapshots_are_ordered_by_strategy() {
        let registry = BreakerRegistry::new(CircuitBreakerConfig::default());
        registry.breaker("substring");
        registry.breaker("recent");
        let names: Vec<String> = registry
            .snapshots()
            .into_iter()
            .map(|s| s.strategy)
            .collect();
        assert_eq!(names, vec!["recent".to_string(), "substring".to_string()]);
    }
}
