//! # memory-types
//!
//! Shared domain types for the memory query engine.
//!
//! This crate defines the vocabulary the other crates speak:
//! - Records: stored memories and their JSON document projections
//! - Queries: search requests, structured filters, ranked results
//! - Errors: classified failure types with recoverability rules
//! - Configuration: layered engine settings with whole-tree validation
//! - Clock: injectable time source for deterministic tests

pub mod clock;
pub mod config;
pub mod error;
pub mod query;
pub mod record;

pub use clock::{format_timestamp, Clock, ManualClock, SharedClock, SystemClock};
pub use config::{
    CircuitBreakerConfig, EngineConfig, FilterConfig, OrchestratorConfig, RetryConfig,
    StrategyConfig,
};
pub use error::{
    classify_message, ConfigError, StoreError, StoreErrorKind, StrategyError, StrategyErrorKind,
    ValidationError,
};
pub use query::{QueryFilters, SearchQuery, SearchResult, SortOrder, MAX_LIMIT, MAX_QUERY_LENGTH};
pub use record::{MemoryKind, MemoryRecord};

pub mod prelude {
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::EngineConfig;
    pub use crate::error::{StrategyError, StrategyErrorKind};
    pub use crate::query::{SearchQuery, SearchResult};
    pub use crate::record::{MemoryKind, MemoryRecord};
}
