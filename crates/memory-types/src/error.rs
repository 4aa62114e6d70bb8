//! Error types shared across the query engine.
//!
//! Errors are classified at construction time so retry and fallback logic
//! can branch on a structured kind instead of parsing display strings. The
//! message-pattern fallback in [`classify_message`] only runs for kinds that
//! carry no reliable signal of their own.

use thiserror::Error;

/// A query rejected before execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid query: {0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure class reported by a persistence backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Backend unreachable or refusing connections.
    Unavailable,
    /// Transient contention (lock held, pool exhausted).
    Busy,
    /// Backend did not answer in time.
    Timeout,
    /// Persisted data failed integrity checks.
    Corrupted,
    /// Caller lacks access.
    PermissionDenied,
    /// The backend cannot serve this request shape.
    Unsupported,
    /// Anything the backend could not classify.
    Internal,
}

/// Error surfaced by a persistence backend.
#[derive(Debug, Clone, Error)]
#[error("store error ({kind:?}): {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Busy, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Timeout, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unsupported, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Internal, message)
    }

    /// Whether retrying the same call could plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        match self.kind {
            StoreErrorKind::Unavailable | StoreErrorKind::Busy | StoreErrorKind::Timeout => true,
            StoreErrorKind::Corrupted
            | StoreErrorKind::PermissionDenied
            | StoreErrorKind::Unsupported => false,
            StoreErrorKind::Internal => classify_message(&self.message),
        }
    }
}

/// Failure class for a single strategy execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyErrorKind {
    /// The strategy exceeded its execution deadline.
    Timeout,
    /// The underlying store failed.
    Store,
    /// The strategy cannot run against this query shape.
    InvalidQuery,
    /// The strategy was refused resources (open breaker, full pool).
    ResourceExhausted,
    /// Unclassified internal failure.
    Internal,
}

/// Error from one strategy attempt, tagged with the strategy that failed.
#[derive(Debug, Clone, Error)]
#[error("strategy '{strategy}' failed ({kind:?}): {message}")]
pub struct StrategyError {
    pub strategy: String,
    pub kind: StrategyErrorKind,
    pub message: String,
}

impl StrategyError {
    pub fn new(
        strategy: impl Into<String>,
        kind: StrategyErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(strategy, StrategyErrorKind::Timeout, message)
    }

    pub fn invalid_query(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(strategy, StrategyErrorKind::InvalidQuery, message)
    }

    pub fn resource_exhausted(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(strategy, StrategyErrorKind::ResourceExhausted, message)
    }

    pub fn internal(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(strategy, StrategyErrorKind::Internal, message)
    }

    pub fn from_store(strategy: impl Into<String>, source: &StoreError) -> Self {
        Self::new(strategy, StrategyErrorKind::Store, source.to_string())
    }

    /// Whether the failure is worth retrying or falling back from.
    ///
    /// Structured kinds decide first; only `Store` and `Internal` fall
    /// through to message inspection.
    pub fn is_recoverable(&self) -> bool {
        match self.kind {
            StrategyErrorKind::Timeout | StrategyErrorKind::ResourceExhausted => true,
            StrategyErrorKind::InvalidQuery => false,
            StrategyErrorKind::Store | StrategyErrorKind::Internal => {
                classify_message(&self.message)
            }
        }
    }
}

/// Message-pattern classification for errors without a structured kind.
///
/// Fatal markers win over transient ones, and unknown text is treated as
/// non-recoverable so a novel failure never loops through retries.
pub fn classify_message(message: &str) -> bool {
    const TRANSIENT: &[&str] = &[
        "lock",
        "busy",
        "timeout",
        "timed out",
        "network",
        "connection",
        "temporarily",
    ];
    const FATAL: &[&str] = &[
        "syntax",
        "parse",
        "corrupt",
        "permission",
        "unsupported",
        "config",
    ];

    let lower = message.to_lowercase();
    if FATAL.iter().any(|marker| lower.contains(marker)) {
        return false;
    }
    TRANSIENT.iter().any(|marker| lower.contains(marker))
}
