//! Configuration for the query engine.
//!
//! Layered loading: defaults -> config file -> environment variables.
//! Environment variables use the `MEMORY_QUERY` prefix with `__` separating
//! path segments, e.g. `MEMORY_QUERY__CIRCUIT_BREAKER__FAILURE_THRESHOLD=3`.
//!
//! Updates are all-or-nothing: [`EngineConfig::validate`] must pass before a
//! new configuration is applied anywhere.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Base name of the optional config file discovered in the working
/// directory (`memory-query.toml`, `.yaml`, or `.json`).
pub const DEFAULT_CONFIG_BASENAME: &str = "memory-query";

/// Circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the breaker opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the breaker stays open before admitting a probe call.
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_secs() -> u64 {
    30
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Open-state hold time as a chrono duration for clock arithmetic.
    pub fn recovery_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.recovery_timeout_secs as i64)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be > 0".to_string());
        }
        if self.recovery_timeout_secs == 0 {
            return Err("recovery_timeout_secs must be > 0".to_string());
        }
        Ok(())
    }
}

/// Retry pacing for recoverable strategy failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry attempts after the initial call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay (ms). Doubles per attempt.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (ms).
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_backoff_ms == 0 {
            return Err("initial_backoff_ms must be > 0".to_string());
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(format!(
                "initial_backoff_ms {} exceeds max_backoff_ms {}",
                self.initial_backoff_ms, self.max_backoff_ms
            ));
        }
        if self.max_retries > 10 {
            return Err("max_retries must be <= 10".to_string());
        }
        Ok(())
    }
}

/// Bounds on filter expression shape and estimator caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Maximum tree depth accepted by the parser and builder.
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,

    /// Maximum children of a single logical node after flattening.
    #[serde(default = "default_max_children_per_node")]
    pub max_children_per_node: usize,

    /// Entries held by the selectivity cache before FIFO eviction.
    #[serde(default = "default_selectivity_cache_capacity")]
    pub selectivity_cache_capacity: usize,
}

fn default_max_nesting_depth() -> usize {
    10
}

fn default_max_children_per_node() -> usize {
    32
}

fn default_selectivity_cache_capacity() -> usize {
    512
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: default_max_nesting_depth(),
            max_children_per_node: default_max_children_per_node(),
            selectivity_cache_capacity: default_selectivity_cache_capacity(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_nesting_depth == 0 {
            return Err("max_nesting_depth must be > 0".to_string());
        }
        if self.max_children_per_node < 2 {
            return Err("max_children_per_node must be >= 2".to_string());
        }
        if self.selectivity_cache_capacity == 0 {
            return Err("selectivity_cache_capacity must be > 0".to_string());
        }
        Ok(())
    }
}

/// Per-strategy execution limits. The `strategy` section of
/// [`EngineConfig`] supplies the baseline; entries under `strategies.<name>`
/// override it wholesale for that strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Whether the strategy may run at all.
    #[serde(default = "default_strategy_enabled")]
    pub enabled: bool,

    /// Per-call deadline (ms).
    #[serde(default = "default_strategy_timeout_ms")]
    pub timeout_ms: u64,

    /// Cap on raw candidates a single strategy call may return.
    #[serde(default = "default_strategy_max_results")]
    pub max_results: usize,
}

fn default_strategy_enabled() -> bool {
    true
}

fn default_strategy_timeout_ms() -> u64 {
    5_000
}

fn default_strategy_max_results() -> usize {
    50
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            enabled: default_strategy_enabled(),
            timeout_ms: default_strategy_timeout_ms(),
            max_results: default_strategy_max_results(),
        }
    }
}

impl StrategyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("timeout_ms must be > 0".to_string());
        }
        if self.max_results == 0 {
            return Err("max_results must be > 0".to_string());
        }
        Ok(())
    }
}

/// Orchestrator-level policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Strategies whose timeouts are retried in place instead of
    /// immediately falling back.
    #[serde(default = "default_timeout_retryable")]
    pub timeout_retryable: Vec<String>,

    /// Ring buffer capacity for the error tracker.
    #[serde(default = "default_error_buffer_capacity")]
    pub error_buffer_capacity: usize,

    /// Rolling window (seconds) used for error trend classification.
    #[serde(default = "default_error_window_secs")]
    pub error_window_secs: u64,
}

fn default_timeout_retryable() -> Vec<String> {
    vec!["recent".to_string(), "substring".to_string()]
}

fn default_error_buffer_capacity() -> usize {
    1_000
}

fn default_error_window_secs() -> u64 {
    300
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeout_retryable: default_timeout_retryable(),
            error_buffer_capacity: default_error_buffer_capacity(),
            error_window_secs: default_error_window_secs(),
        }
    }
}

impl OrchestratorConfig {
    /// Whether `strategy` gets an in-place retry after a timeout.
    pub fn retries_timeouts(&self, strategy: &str) -> bool {
        self.timeout_retryable.iter().any(|name| name == strategy)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.error_buffer_capacity == 0 {
            return Err("error_buffer_capacity must be > 0".to_string());
        }
        if self.error_window_secs == 0 {
            return Err("error_window_secs must be > 0".to_string());
        }
        Ok(())
    }
}

/// Root configuration consumed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    /// Baseline limits applied to every strategy without an override.
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Per-strategy overrides keyed by strategy name.
    #[serde(default)]
    pub strategies: HashMap<String, StrategyConfig>,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl EngineConfig {
    /// Effective limits for `strategy`, falling back to the baseline.
    pub fn strategy_config(&self, strategy: &str) -> StrategyConfig {
        self.strategies
            .get(strategy)
            .cloned()
            .unwrap_or_else(|| self.strategy.clone())
    }

    /// Validate the whole tree. No partial application: callers must hold
    /// their previous configuration when this fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.circuit_breaker
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("circuit_breaker: {e}")))?;
        self.retry
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("retry: {e}")))?;
        self.filter
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("filter: {e}")))?;
        self.strategy
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("strategy: {e}")))?;
        for (name, overrides) in &self.strategies {
            overrides
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("strategies.{name}: {e}")))?;
        }
        self.orchestrator
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("orchestrator: {e}")))?;
        Ok(())
    }

    /// Load configuration in precedence order:
    ///
    /// 1. Built-in defaults
    /// 2. `memory-query.{toml,yaml,json}` in the working directory
    /// 3. Explicit config file passed by the caller
    /// 4. Environment variables (`MEMORY_QUERY__*`)
    pub fn load(explicit_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("circuit_breaker.failure_threshold", default_failure_threshold() as i64)?
            .set_default(
                "circuit_breaker.recovery_timeout_secs",
                default_recovery_timeout_secs() as i64,
            )?
            .set_default("retry.max_retries", default_max_retries() as i64)?
            .set_default("retry.initial_backoff_ms", default_initial_backoff_ms() as i64)?
            .set_default("retry.max_backoff_ms", default_max_backoff_ms() as i64)?
            .set_default("filter.max_nesting_depth", default_max_nesting_depth() as i64)?
            .set_default("strategy.timeout_ms", default_strategy_timeout_ms() as i64)?
            .set_default("strategy.max_results", default_strategy_max_results() as i64)?
            .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

        if let Some(path) = explicit_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("MEMORY_QUERY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
