use thiserror::Error;

/// Errors produced when parsing entity-model values from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("unknown priority: {0}")]
    UnknownPriority(String),
}
