//! Memory records and their JSON document projections.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::format_timestamp;

/// Retention classification of a memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Facts, decisions, and preferences that must survive pruning.
    Essential,
    /// Ordinary conversation turns.
    Conversational,
    /// External reference material such as docs and code snippets.
    Reference,
    /// Cold records retained for audit only.
    Archival,
}

impl MemoryKind {
    /// All kinds, in retention-priority order.
    pub fn all() -> [MemoryKind; 4] {
        [
            MemoryKind::Essential,
            MemoryKind::Conversational,
            MemoryKind::Reference,
            MemoryKind::Archival,
        ]
    }

    /// Wire form used in documents and stored metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Essential => "essential",
            MemoryKind::Conversational => "conversational",
            MemoryKind::Reference => "reference",
            MemoryKind::Archival => "archival",
        }
    }

    /// Parse from the wire form produced by [`as_str`](Self::as_str).
    pub fn parse(s: &str) -> Option<MemoryKind> {
        match s {
            "essential" => Some(MemoryKind::Essential),
            "conversational" => Some(MemoryKind::Conversational),
            "reference" => Some(MemoryKind::Reference),
            "archival" => Some(MemoryKind::Archival),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored memory as surfaced by the persistence layer.
///
/// Records are read-only inputs to the query engine. Filter expressions never
/// inspect a record directly; they run against the flat JSON projection
/// returned by [`as_document`](Self::as_document).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Stable identifier assigned by the store.
    pub id: String,
    /// Raw memory text.
    pub content: String,
    /// Retention classification.
    pub kind: MemoryKind,
    /// Free-form attributes attached at ingest time.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time, if the record was ever updated.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        kind: MemoryKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            kind,
            metadata: Map::new(),
            created_at,
            updated_at: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// String metadata value for `key`, if present and a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Category tag, by convention stored under the `category` metadata key.
    pub fn category(&self) -> Option<&str> {
        self.metadata_str("category")
    }

    /// Project this record into a flat JSON document for filter evaluation.
    ///
    /// Metadata keys are spread at the top level so expressions can reference
    /// them without a prefix. Intrinsic fields win on key collision, and the
    /// full map stays reachable under `metadata.<key>` paths. Timestamps are
    /// rendered in the fixed-width RFC 3339 form so string comparison orders
    /// them chronologically.
    pub fn as_document(&self) -> Value {
        let mut doc = Map::new();
        for (key, value) in &self.metadata {
            doc.insert(key.clone(), value.clone());
        }
        doc.insert("id".into(), Value::String(self.id.clone()));
        doc.insert("content".into(), Value::String(self.content.clone()));
        doc.insert(
            "classification".into(),
            Value::String(self.kind.as_str().to_string()),
        );
        doc.insert(
            "created_at".into(),
            Value::String(format_timestamp(self.created_at)),
        );
        if let Some(updated) = self.updated_at {
            doc.insert("updated_at".into(), Value::String(format_timestamp(updated)));
        }
        doc.insert("metadata".into(), Value::Object(self.metadata.clone()));
        Value::Object(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_record() -> MemoryRecord {
        MemoryRecord::new(
            "mem-001",
            "prefers dark mode",
            MemoryKind::Essential,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        )
        .with_metadata_entry("category", json!("preferences"))
        .with_metadata_entry("priority", json!(3))
    }

    #[test]
    fn kind_round_trips_through_wire_form() {
        for kind in MemoryKind::all() {
            assert_eq!(MemoryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MemoryKind::parse("unknown"), None);
    }

    #[test]
    fn document_spreads_metadata_at_top_level() {
        let doc = sample_record().as_document();
        assert_eq!(doc["category"], json!("preferences"));
        assert_eq!(doc["priority"], json!(3));
        assert_eq!(doc["metadata"]["category"], json!("preferences"));
        assert_eq!(doc["classification"], json!("essential"));
    }

    #[test]
    fn intrinsic_fields_win_on_collision() {
        let record = sample_record().with_metadata_entry("id", json!("spoofed"));
        let doc = record.as_document();
        assert_eq!(doc["id"], json!("mem-001"));
        // The original value is still reachable through the nested path.
        assert_eq!(doc["metadata"]["id"], json!("spoofed"));
    }

    #[test]
    fn document_timestamps_order_lexicographically() {
        let earlier = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let later = earlier + chrono::Duration::milliseconds(500);
        assert!(format_timestamp(earlier) < format_timestamp(later));
    }

    #[test]
    fn category_reads_conventional_metadata_key() {
        assert_eq!(sample_record().category(), Some("preferences"));
        let bare = MemoryRecord::new("mem-002", "note", MemoryKind::Reference, Utc::now());
        assert_eq!(bare.category(), None);
    }
}