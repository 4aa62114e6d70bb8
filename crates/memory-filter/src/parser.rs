//! Precedence-climbing parser for the filter DSL.
//!
//! Grammar:
//!
//! ```text
//! expr     := not-expr (("AND"|"OR") not-expr)*
//! not-expr := "NOT"? primary
//! primary  := "(" expr ")" | field operator value
//! ```
//!
//! NOT binds tighter than AND, AND tighter than OR; parentheses reset
//! precedence. The field slot accepts `Value`-classified barewords because
//! the tokenizer classifies any word after `AND`/`OR` as a value; the value
//! slot is strict, and a missing value is reported at the operator's
//! position.

use crate::ast::{ComparisonOperator, FilterLimits, FilterNode, LogicalOperator};
use crate::error::{FilterError, ParseError};
use crate::token::{Token, TokenKind};
use crate::tokenizer::Tokenizer;
use crate::value::FilterValue;

/// Reusable parser carrying structural limits.
#[derive(Debug, Clone, Default)]
pub struct FilterParser {
    limits: FilterLimits,
}

impl FilterParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: FilterLimits) -> Self {
        Self { limits }
    }

    /// Parse `expression` into a validated filter tree.
    ///
    /// The parser never drops input: trailing tokens, missing operands, and
    /// unbalanced parentheses all fail with a [`ParseError`] pointing at the
    /// offending span. Depth violations surface as
    /// [`FilterError::Validation`].
    pub fn parse(&self, expression: &str) -> Result<FilterNode, FilterError> {
        if expression.trim().is_empty() {
            return Err(ParseError::new("empty filter expression", 0, 0).into());
        }
        let tokens = Tokenizer::new(expression).tokenize()?;
        let mut cursor = Cursor { tokens: &tokens, index: 0 };
        let tree = parse_expression(&mut cursor, 0)?;
        let trailing = cursor.current();
        if trailing.kind != TokenKind::Eof {
            return Err(ParseError::new(
                format!("unexpected {} '{}'", trailing.kind, trailing.text),
                trailing.position,
                trailing.len(),
            )
            .into());
        }
        tree.validate(&self.limits)?;
        Ok(tree)
    }
}

/// Parse with default limits.
pub fn parse(expression: &str) -> Result<FilterNode, FilterError> {
    FilterParser::new().parse(expression)
}

struct Cursor<'a> {
    tokens: &'a [Token],
    index: usize,
}

impl<'a> Cursor<'a> {
    fn current(&self) -> &Token {
        // The stream always ends with Eof, which is never consumed.
        &self.tokens[self.index]
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.index].clone();
        if token.kind != TokenKind::Eof {
            self.index += 1;
        }
        token
    }
}

fn parse_expression(cursor: &mut Cursor<'_>, min_precedence: u8) -> Result<FilterNode, ParseError> {
    let mut left = parse_unary(cursor)?;
    loop {
        let token = cursor.current();
        if token.kind != TokenKind::LogicalOp {
            break;
        }
        let operator = if token.is_logical("AND") {
            LogicalOperator::And
        } else if token.is_logical("OR") {
            LogicalOperator::Or
        } else {
            return Err(ParseError::new(
                "NOT cannot join two expressions",
                token.position,
                token.len(),
            ));
        };
        if operator.precedence() < min_precedence {
            break;
        }
        cursor.bump();
        let right = parse_expression(cursor, operator.precedence() + 1)?;
        left = combine(left, operator, right);
    }
    Ok(left)
}

/// Join two operands, flattening runs of the same connective into one
/// n-ary node so `a AND b AND c` has a single AND with three children.
fn combine(left: FilterNode, operator: LogicalOperator, right: FilterNode) -> FilterNode {
    match left {
        FilterNode::Logical {
            operator: existing,
            mut children,
        } if existing == operator => {
            children.push(right);
            FilterNode::Logical { operator, children }
        }
        other => FilterNode::Logical {
            operator,
            children: vec![other, right],
        },
    }
}

fn parse_unary(cursor: &mut Cursor<'_>) -> Result<FilterNode, ParseError> {
    if cursor.current().is_logical("NOT") {
        cursor.bump();
        let child = parse_expression(cursor, LogicalOperator::Not.precedence())?;
        return Ok(FilterNode::negate(child));
    }
    parse_primary(cursor)
}

fn parse_primary(cursor: &mut Cursor<'_>) -> Result<FilterNode, ParseError> {
    let token = cursor.current().clone();
    match token.kind {
        TokenKind::LParen => {
            cursor.bump();
            let inner = parse_expression(cursor, 0)?;
            let close = cursor.current().clone();
            if close.kind != TokenKind::RParen {
                return Err(ParseError::new(
                    "expected ')'",
                    close.position,
                    close.len(),
                ));
            }
            cursor.bump();
            Ok(FilterNode::group(inner))
        }
        TokenKind::Field | TokenKind::Value => parse_comparison(cursor),
        TokenKind::Eof => Err(ParseError::new(
            "expected field or '(' before end of input",
            token.position,
            0,
        )),
        _ => Err(ParseError::new(
            format!("expected field or '(', found {} '{}'", token.kind, token.text),
            token.position,
            token.len(),
        )),
    }
}

fn parse_comparison(cursor: &mut Cursor<'_>) -> Result<FilterNode, ParseError> {
    let field = cursor.bump();

    let op_token = cursor.current().clone();
    if op_token.kind != TokenKind::Operator {
        let found = if op_token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("{} '{}'", op_token.kind, op_token.text)
        };
        return Err(ParseError::new(
            format!("expected operator after '{}', found {found}", field.text),
            op_token.position,
            op_token.len(),
        ));
    }
    cursor.bump();
    let operator = ComparisonOperator::from_token(&op_token.text).ok_or_else(|| {
        ParseError::new(
            format!("unknown operator '{}'", op_token.text),
            op_token.position,
            op_token.len(),
        )
    })?;

    let value_token = cursor.current().clone();
    if value_token.kind != TokenKind::Value {
        // Missing values are reported at the operator that wanted them.
        return Err(ParseError::new(
            format!("operator '{}' expects a value", op_token.text),
            op_token.position,
            op_token.len(),
        ));
    }
    cursor.bump();

    Ok(FilterNode::comparison(
        field.text,
        operator,
        FilterValue::coerce(&value_token.text),
    ))
}
