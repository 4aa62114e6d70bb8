//! Filter expression errors.

use thiserror::Error;

/// A malformed filter expression, pointing at the offending span.
///
/// `position` is a byte offset into the original expression string and
/// `length` the width of the offending token (zero at end of input).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
    pub length: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize, length: usize) -> Self {
        Self {
            message: message.into(),
            position,
            length,
        }
    }

    /// Byte range of the offending span in the source expression.
    pub fn span(&self) -> (usize, usize) {
        (self.position, self.position + self.length)
    }
}

/// Any failure producing or validating a filter tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A structurally invalid tree (depth or arity bounds violated).
    #[error("invalid filter: {0}")]
    Validation(String),
}

impl FilterError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
