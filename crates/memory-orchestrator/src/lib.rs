//! # memory-orchestrator
//!
//! Multi-strategy search over stored memories.
//!
//! This crate coordinates a set of retrieval strategies against a shared
//! store: it picks which strategies a query deserves, runs them in policy
//! order behind circuit breakers, timeouts, and retries, substitutes
//! fallbacks when a strategy fails, then merges, filters, ranks, and
//! paginates whatever was collected. A search only errors when the query
//! itself is invalid; infrastructure trouble degrades the response instead
//! of failing it.
//!
//! ## Core Concepts
//!
//! - **SearchOrchestrator**: The search entry point; owns strategies,
//!   breakers, and the error tracker
//! - **SearchStrategy**: One retrieval approach (term overlap, recency,
//!   category, metadata, time windows, similarity)
//! - **MemoryStore**: Read-side store interface strategies fetch through
//! - **SearchResponse**: Ranked results plus degradation flags
//! - **Fallback chain**: Full-text falls back to substring, then recency;
//!   every other failure falls back to substring
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use memory_orchestrator::{InMemoryStore, SearchOrchestrator};
//! use memory_types::{MemoryKind, MemoryRecord, SearchQuery};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(InMemoryStore::new());
//! store.insert(MemoryRecord::new(
//!     "note-1",
//!     "remember to buy oat milk",
//!     MemoryKind::Conversational,
//!     chrono::Utc::now(),
//! ));
//!
//! let orchestrator = SearchOrchestrator::new(store);
//! let response = orchestrator
//!     .search(&SearchQuery::text("oat milk"))
//!     .await
//!     .unwrap();
//! assert!(response.has_results());
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`orchestrator`]: The search pipeline and its diagnostics surface
//! - [`strategies`]: The strategy trait, the standard seven, and a scripted
//!   test double
//! - [`store`]: The store trait and a Vec-backed reference implementation
//! - [`ordering`]: Query-shape policy for strategy execution order
//! - [`ranking`]: Composite scoring and result ordering
//! - [`error`]: The orchestrator's error type

pub mod error;
pub mod orchestrator;
pub mod ordering;
pub mod ranking;
pub mod store;
pub mod strategies;

pub use error::SearchError;
pub use orchestrator::{Diagnostics, SearchOrchestrator, SearchResponse};
pub use ordering::strategy_order;
pub use ranking::{composite_score, rank_results};
pub use store::{FlakyStore, InMemoryStore, MemoryStore};
pub use strategies::{
    default_strategies, CategoryStrategy, FullTextStrategy, MetadataStrategy, RecentStrategy,
    ScriptedStrategy, SearchStrategy, SemanticStrategy, SubstringStrategy, TemporalStrategy,
    CATEGORY, FULLTEXT, METADATA, RECENT, SEMANTIC, SUBSTRING, TEMPORAL,
};

pub mod prelude {
    pub use crate::error::SearchError;
    pub use crate::orchestrator::{SearchOrchestrator, SearchResponse};
    pub use crate::store::{InMemoryStore, MemoryStore};
    pub use crate::strategies::{default_strategies, SearchStrategy};
}
