//! Error types for modem line parsing

use thiserror::Error;

/// Errors that can occur while parsing modem output
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line does not carry the expected prefix
    #[error("missing prefix {expected:?} in line {line:?}")]
    MissingPrefix { expected: &'static str, line: String },

    /// A quoted field was opened but never closed
    #[error("unterminated quoted field in {0:?}")]
    UnterminatedQuote(String),

    /// A numeric field could not be parsed
    #[error("invalid numeric field: {0}")]
    InvalidNumber(String),
}
