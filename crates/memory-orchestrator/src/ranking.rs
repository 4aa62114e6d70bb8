//! Composite scoring and final ordering of merged results.

use std::cmp::Ordering;
use std::collections::HashMap;

use memory_types::{SearchQuery, SearchResult, SortOrder};

/// Multiplier applied when result content contains the query text verbatim.
const LITERAL_BOOST: f32 = 1.2;

/// Composite relevance for one result.
///
/// The strategy's base score is weighted by its priority, then boosted when
/// the content carries the literal query text (case-insensitive).
pub fn composite_score(result: &SearchResult, priority: i32, query_text: &str) -> f32 {
    let mut score = result.score * (1.0 + priority as f32 / 100.0);
    let literal = query_text.trim();
    if !literal.is_empty()
        && result
            .content
            .to_lowercase()
            .contains(&literal.to_lowercase())
    {
        score *= LITERAL_BOOST;
    }
    score
}

/// Order merged results in place according to the query's sort.
///
/// Relevance rewrites each result's score to its composite value and sorts
/// descending; newest/oldest sort by record timestamp. All sorts are
/// stable, so ties keep their merge order.
pub fn rank_results(
    results: &mut [SearchResult],
    priorities: &HashMap<String, i32>,
    query: &SearchQuery,
) {
    match query.sort_by {
        SortOrder::Relevance => {
            for result in results.iter_mut() {
                let priority = priorities.get(&result.strategy).copied().unwrap_or(0);
                result.score = composite_score(result, priority, &query.text);
            }
            results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        }
        SortOrder::Newest => results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        SortOrder::Oldest => results.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::Map;

    fn result(id: &str, content: &str, score: f32, strategy: &str, day: u32) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            content: content.to_string(),
            metadata: Map::new(),
            score,
            strategy: strategy.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 4, day, 0, 0, 0).unwrap(),
        }
    }

    fn priorities() -> HashMap<String, i32> {
        HashMap::from([("fulltext".to_string(), 10), ("recent".to_string(), 3)])
    }

    #[test]
    fn priority_weights_the_base_score() {
        let hit = result("a", "unrelated", 0.5, "fulltext", 1);
        assert!((composite_score(&hit, 10, "milk") - 0.55).abs() < 1e-6);
        assert!((composite_score(&hit, 0, "milk") - 0.5).abs() < 1e-6);
    }

    #[test]
    fn literal_matches_get_boosted() {
        let hit = result("a", "Buy MILK today", 0.5, "fulltext", 1);
        let boosted = composite_score(&hit, 10, "milk");
        assert!((boosted - 0.5 * 1.1 * 1.2).abs() < 1e-6);
        // Empty query text never boosts.
        assert!((composite_score(&hit, 10, "  ") - 0.55).abs() < 1e-6);
    }

    #[test]
    fn relevance_sort_is_descending_and_rewrites_scores() {
        let mut results = vec![
            result("low", "nothing here", 0.4, "recent", 1),
            result("high", "milk run", 0.9, "fulltext", 1),
        ];
        rank_results(&mut results, &priorities(), &SearchQuery::text("milk"));

        assert_eq!(results[0].id, "high");
        assert!((results[0].score - 0.9 * 1.1 * 1.2).abs() < 1e-6);
        assert!((results[1].score - 0.4 * 1.03).abs() < 1e-6);
    }

    #[test]
    fn ties_keep_their_merge_order() {
        let mut results = vec![
            result("first", "same", 0.5, "recent", 1),
            result("second", "same", 0.5, "recent", 2),
        ];
        rank_results(&mut results, &priorities(), &SearchQuery::text("milk"));
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn timestamp_sorts_ignore_scores() {
        let mut results = vec![
            result("old", "x", 0.9, "fulltext", 1),
            result("new", "x", 0.1, "fulltext", 20),
        ];
        rank_results(
            &mut results,
            &priorities(),
            &SearchQuery::text("x").with_sort(SortOrder::Newest),
        );
        assert_eq!(results[0].id, "new");
        // Scores are untouched outside relevance ordering.
        assert!((results[0].score - 0.1).abs() < 1e-6);

        rank_results(
            &mut results,
            &priorities(),
            &SearchQuery::text("x").with_sort(SortOrder::Oldest),
        );
        assert_eq!(results[0].id, "old");
    }
}
