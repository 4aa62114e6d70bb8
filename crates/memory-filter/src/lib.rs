//! # memory-filter
//!
//! Filter expression DSL for the memory query engine.
//!
//! This crate owns the textual filter language end to end: tokenizing,
//! parsing with correct precedence, typed values, and pure evaluation of
//! the resulting tree against JSON documents.
//!
//! ## Core Concepts
//!
//! - **Token**: One lexical unit with its byte position in the expression
//! - **FilterNode**: Immutable tree of comparisons, logical connectives, and groups
//! - **FilterValue**: Typed right-hand side (string/number/boolean/array)
//! - **FilterBuilder**: Fluent tree construction without DSL round-trips
//! - **Evaluation**: Pure `tree x document -> bool`, short-circuiting
//!
//! ## Usage
//!
//! ```rust
//! use memory_filter::{evaluate, parse};
//! use serde_json::json;
//!
//! let tree = parse("importance = high AND confidenceScore > 0.8").unwrap();
//! let record = json!({"importance": "high", "confidenceScore": 0.93});
//! assert!(evaluate(&tree, &record));
//! ```
//!
//! ## Modules
//!
//! - [`token`]: Token kinds and positions
//! - [`tokenizer`]: Expression scanning and bareword classification
//! - [`ast`]: Tree nodes, operators, structural limits
//! - [`parser`]: Precedence-climbing parser
//! - [`value`]: Typed values and coercion
//! - [`builder`]: Fluent tree construction
//! - [`eval`]: Evaluation over JSON documents

pub mod ast;
pub mod builder;
pub mod error;
pub mod eval;
pub mod parser;
pub mod token;
pub mod tokenizer;
pub mod value;

pub use ast::{ComparisonOperator, FilterLimits, FilterNode, LogicalOperator, OperatorCategory};
pub use builder::FilterBuilder;
pub use error::{FilterError, ParseError};
pub use eval::{evaluate, filter_documents, lookup_path};
pub use parser::{parse, FilterParser};
pub use token::{Token, TokenKind};
pub use tokenizer::tokenize;
pub use value::FilterValue;

pub mod prelude {
    pub use crate::ast::{ComparisonOperator, FilterNode, LogicalOperator};
    pub use crate::builder::FilterBuilder;
    pub use crate::error::{FilterError, ParseError};
    pub use crate::eval::evaluate;
    pub use crate::parser::{parse, FilterParser};
    pub use crate::value::FilterValue;
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classification_filter_selects_the_matching_record() {
        let tree = parse("classification=essential").unwrap();
        let records = vec![
            json!({"id": 1, "classification": "conversational"}),
            json!({"id": 2, "classification": "essential"}),
        ];
        let kept: Vec<i64> = filter_documents(&tree, &records)
            .into_iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(kept, vec![2]);
    }

    #[test]
    fn conjunction_selects_exactly_the_record_satisfying_both() {
        let tree = parse("importance=high AND confidenceScore>0.8").unwrap();
        let records = vec![
            json!({"id": 1, "importance": "high", "confidenceScore": 0.5}),
            json!({"id": 2, "importance": "low", "confidenceScore": 0.95}),
            json!({"id": 3, "importance": "high", "confidenceScore": 0.9}),
        ];
        let kept: Vec<i64> = filter_documents(&tree, &records)
            .into_iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(kept, vec![3]);
    }

    #[test]
    fn dangling_operator_reports_its_position_instead_of_crashing() {
        let err = parse("field >").unwrap_err();
        let FilterError::Parse(err) = err else {
            panic!("expected a parse error");
        };
        assert_eq!(err.position, 6);
    }

    #[test]
    fn parse_and_evaluate_are_deterministic() {
        let tree = parse("a = 1 OR (b = 2 AND NOT c = 3)").unwrap();
        let doc = json!({"a": 0, "b": 2, "c": 4});
        let first = evaluate(&tree, &doc);
        for _ in 0..3 {
            assert_eq!(evaluate(&tree, &doc), first);
        }
        assert!(first);
    }
}
