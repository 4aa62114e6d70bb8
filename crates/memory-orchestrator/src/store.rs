//! Persistence accessor consumed by search strategies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use memory_planner::LoweredQuery;
use memory_types::{MemoryRecord, StoreError};

/// Read-side interface onto the memory store.
///
/// Strategies never touch a backend directly; they go through this trait
/// so tests can substitute in-memory fixtures and so pushdown-capable
/// backends can accept lowered filter queries.
///
/// # Example
///
/// ```rust,ignore
/// use memory_orchestrator::MemoryStore;
/// use memory_types::{MemoryRecord, StoreError};
///
/// struct SqliteStore { /* pool, paths, ... */ }
///
/// #[async_trait::async_trait]
/// impl MemoryStore for SqliteStore {
///     async fn recent(&self, limit: usize) -> Result<Vec<MemoryRecord>, StoreError> {
///         // SELECT ... ORDER BY created_at DESC LIMIT ?
///         todo!()
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Most recently created records, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<MemoryRecord>, StoreError>;

    /// Every record, for in-memory filter evaluation.
    async fn scan(&self) -> Result<Vec<MemoryRecord>, StoreError>;

    /// Records whose content matches `text`, newest first.
    ///
    /// Matching is backend-defined; the reference implementation treats a
    /// record as a hit when its content contains any query term.
    async fn text_search(&self, text: &str, limit: usize)
        -> Result<Vec<MemoryRecord>, StoreError>;

    /// Total number of stored records.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Whether [`search_lowered`](Self::search_lowered) is implemented.
    fn supports_lowered_queries(&self) -> bool {
        false
    }

    /// Run a lowered filter query on the backend.
    ///
    /// Backends returning `true` from
    /// [`supports_lowered_queries`](Self::supports_lowered_queries) must
    /// override this. The result may be a superset of the exact filter
    /// semantics; callers re-check matches in memory.
    async fn search_lowered(
        &self,
        query: &LoweredQuery,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        let _ = (query, limit);
        Err(StoreError::unsupported(
            "backend does not accept lowered queries",
        ))
    }
}

/// Vec-backed reference store.
///
/// Used by tests and as the baseline for embedding the engine without a
/// real backend. Reads clone records; the lock is never held across an
/// await point.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<MemoryRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<MemoryRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn insert(&self, record: MemoryRecord) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<MemoryRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn recent(&self, limit: usize) -> Result<Vec<MemoryRecord>, StoreError> {
        let mut records = self.snapshot();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn scan(&self) -> Result<Vec<MemoryRecord>, StoreError> {
        Ok(self.snapshot())
    }

    async fn text_search(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        let terms: Vec<String> = text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let mut hits: Vec<MemoryRecord> = self
            .snapshot()
            .into_iter()
            .filter(|record| {
                let content = record.content.to_lowercase();
                terms.iter().any(|term| content.contains(term))
            })
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits.truncate(limit);
        debug!(terms = terms.len(), hits = hits.len(), "text search scan");
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.len())
    }
}

/// Store that fails a scripted number of reads before recovering.
///
/// Counterpart to [`ScriptedStrategy`](crate::strategies::ScriptedStrategy)
/// on the store side: each read consumes one failure from the budget until
/// it runs out, then calls delegate to the wrapped records. The failure
/// message carries a transient marker, so real strategies retry it.
#[derive(Debug)]
pub struct FlakyStore {
    inner: InMemoryStore,
    remaining_failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new(records: Vec<MemoryRecord>, failures: usize) -> Self {
        Self {
            inner: InMemoryStore::with_records(records),
            remaining_failures: AtomicUsize::new(failures),
        }
    }

    /// Failures not yet consumed.
    pub fn remaining_failures(&self) -> usize {
        self.remaining_failures.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        let consumed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            Err(StoreError::unavailable("connection refused by backend"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MemoryStore for FlakyStore {
    async fn recent(&self, limit: usize) -> Result<Vec<MemoryRecord>, StoreError> {
        self.take_failure()?;
        self.inner.recent(limit).await
    }

    async fn scan(&self) -> Result<Vec<MemoryRecord>, StoreError> {
        self.take_failure()?;
        self.inner.scan().await
    }

    async fn text_search(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        self.take_failure()?;
        self.inner.text_search(text, limit).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.take_failure()?;
        self.inner.count().await
    }
}
