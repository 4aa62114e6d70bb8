//! # memory-resilience
//!
//! Failure-handling building blocks for the search orchestrator.
//!
//! Strategy calls go through a per-strategy circuit breaker, recoverable
//! failures are retried with exponential backoff, and every failure is
//! recorded in a rolling tracker that classifies error trends and emits
//! operator recommendations. All time-dependent behavior runs off an
//! injectable clock so state transitions are deterministic under test.
//!
//! ## Core Concepts
//!
//! - **CircuitBreaker**: closed/open/half-open per strategy, one probe
//!   after the recovery deadline
//! - **BreakerRegistry**: lazy per-name breaker table
//! - **retry_with_backoff**: bounded exponential retry for recoverable
//!   errors only
//! - **ErrorTracker**: bounded failure ring with a sliding analysis window
//!
//! ## Usage
//!
//! ```rust
//! use memory_resilience::{BreakerRegistry, CircuitState};
//! use memory_types::CircuitBreakerConfig;
//!
//! let registry = BreakerRegistry::new(CircuitBreakerConfig::default());
//! let breaker = registry.breaker("fulltext");
//! assert!(breaker.try_acquire().is_ok());
//! breaker.record_success();
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! ```
//!
//! ## Modules
//!
//! - [`breaker`]: Circuit breaker state machine and registry
//! - [`retry`]: Backoff-driven retry loop
//! - [`tracker`]: Failure ring, trends, recommendations

pub mod breaker;
pub mod retry;
pub mod tracker;

pub use breaker::{BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitOpen, CircuitState};
pub use retry::retry_with_backoff;
pub use tracker::{ErrorRecord, ErrorTracker, ErrorTrend, StrategyErrorCount, TrackerSnapshot};

pub mod prelude {
    pub use crate::breaker::{BreakerRegistry, CircuitBreaker, CircuitOpen, CircuitState};
    pub use crate::retry::retry_with_backoff;
    pub use crate::tracker::{ErrorTracker, ErrorTrend};
}
