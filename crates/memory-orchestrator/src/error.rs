//! Top-level error surface of the search service.

use thiserror::Error;

use memory_filter::{FilterError, ParseError};
use memory_types::{ConfigError, StoreError, StrategyError, ValidationError};

/// Everything a search call or its supporting APIs can fail with.
///
/// A search itself only ever surfaces `Validation`: strategy and store
/// failures are absorbed by retry, fallback, and graceful downgrade. The
/// remaining variants come from the auxiliary APIs (expression parsing,
/// reconfiguration) so callers handle one error type throughout.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid query: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid filter expression: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<FilterError> for SearchError {
    fn from(error: FilterError) -> Self {
        match error {
            FilterError::Parse(parse) => SearchError::Parse(parse),
            FilterError::Validation(message) => {
                SearchError::Validation(ValidationError::new(message))
            }
        }
    }
}
