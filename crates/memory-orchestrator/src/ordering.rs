//! Deterministic strategy ordering from query shape.

use memory_types::SearchQuery;

use crate::strategies::{
    contains_keyword, is_complex, CATEGORY, CATEGORY_KEYWORDS, FULLTEXT, METADATA,
    METADATA_KEYWORDS, RECENT, SEMANTIC, SUBSTRING, TEMPORAL, TEMPORAL_KEYWORDS,
};

/// Strategy names in execution order for `query`.
///
/// Pure shape analysis: the same query always yields the same order. The
/// orchestrator prunes entries that are unregistered, disabled, or decline
/// the query. Rules:
///
/// - empty text runs only the recency strategy;
/// - otherwise full-text leads, specialists are spliced in when their
///   facet shows up in the filters or the wording, similarity joins for
///   complex queries, and substring closes as the unconditional fallback.
pub fn strategy_order(query: &SearchQuery) -> Vec<&'static str> {
    if query.has_empty_text() {
        return vec![RECENT];
    }

    let mut order = vec![FULLTEXT];
    if query.filters.has_category_filters() || contains_keyword(&query.text, CATEGORY_KEYWORDS) {
        order.push(CATEGORY);
    }
    if query.filters.has_temporal_filters() || contains_keyword(&query.text, TEMPORAL_KEYWORDS) {
        order.push(TEMPORAL);
    }
    if query.filters.has_metadata_filters() || contains_keyword(&query.text, METADATA_KEYWORDS) {
        order.push(METADATA);
    }
    if is_complex(query) {
        order.push(SEMANTIC);
    }
    order.push(SUBSTRING);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use memory_types::{MemoryKind, QueryFilters};

    #[test]
    fn empty_text_runs_only_recent() {
        assert_eq!(strategy_order(&SearchQuery::default()), vec![RECENT]);
        assert_eq!(strategy_order(&SearchQuery::text("   ")), vec![RECENT]);
    }

    #[test]
    fn plain_text_runs_fulltext_then_substring() {
        assert_eq!(
            strategy_order(&SearchQuery::text("milk")),
            vec![FULLTEXT, SUBSTRING]
        );
    }

    #[test]
    fn facet_keywords_splice_their_specialists() {
        assert_eq!(
            strategy_order(&SearchQuery::text("milk category")),
            vec![FULLTEXT, CATEGORY, SUBSTRING]
        );
        assert_eq!(
            strategy_order(&SearchQuery::text("milk yesterday")),
            vec![FULLTEXT, TEMPORAL, SUBSTRING]
        );
        assert_eq!(
            strategy_order(&SearchQuery::text("milk tagged")),
            vec![FULLTEXT, METADATA, SUBSTRING]
        );
    }

    #[test]
    fn structured_filters_splice_without_keywords() {
        let query = SearchQuery::text("milk").with_filters(QueryFilters {
            kinds: vec![MemoryKind::Essential],
            created_after: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            ..QueryFilters::default()
        });
        assert_eq!(
            strategy_order(&query),
            vec![FULLTEXT, CATEGORY, TEMPORAL, SUBSTRING]
        );
    }

    #[test]
    fn complex_queries_add_similarity_before_the_fallback() {
        assert_eq!(
            strategy_order(&SearchQuery::text("what did we decide about the launch")),
            vec![FULLTEXT, SEMANTIC, SUBSTRING]
        );
        assert_eq!(
            strategy_order(&SearchQuery::text("slow because locks")),
            vec![FULLTEXT, SEMANTIC, SUBSTRING]
        );
    }

    #[test]
    fn every_facet_at_once_keeps_the_canonical_order() {
        let mut filters = QueryFilters {
            categories: vec!["work".into()],
            created_after: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            ..QueryFilters::default()
        };
        filters.metadata.insert("tag".into(), "urgent".into());
        let query =
            SearchQuery::text("everything about the launch because it slipped").with_filters(filters);
        assert_eq!(
            strategy_order(&query),
            vec![FULLTEXT, CATEGORY, TEMPORAL, METADATA, SEMANTIC, SUBSTRING]
        );
    }
}
