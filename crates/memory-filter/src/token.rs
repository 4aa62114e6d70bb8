//! Tokens produced by the filter expression tokenizer.

use std::fmt;

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Left-hand side of a comparison, possibly dotted (`metadata.tag`).
    Field,
    /// Comparison operator, symbolic (`>=`) or word (`LIKE`, `NOT IN`).
    Operator,
    /// Right-hand side of a comparison. Quoted values keep their quotes in
    /// `text` so parse-time coercion can tell them from barewords.
    Value,
    /// `AND`, `OR`, or `NOT`.
    LogicalOp,
    LParen,
    RParen,
    /// End of input. Always the final token of a stream.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Field => "field",
            TokenKind::Operator => "operator",
            TokenKind::Value => "value",
            TokenKind::LogicalOp => "logical operator",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Eof => "end of input",
        };
        f.write_str(name)
    }
}

/// One token with its byte offset into the source expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    pub fn eof(position: usize) -> Self {
        Self::new(TokenKind::Eof, "", position)
    }

    /// Width of the token in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_logical(&self, word: &str) -> bool {
        self.kind == TokenKind::LogicalOp && self.text.eq_ignore_ascii_case(word)
    }
}
