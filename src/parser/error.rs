//! Parser error types

use serde::Serialize;
use thiserror::Error;

/// Result type for parsing operations
pub type ParseResult<T> = std::result::Result<T, SyntaxError>;

/// A syntax error located in the expression text
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message} at position {position}")]
pub struct SyntaxError {
    /// Human-readable message
    pub message: String,
    /// Byte offset of the offending text
    pub position: usize,
    /// Length of the offending text, zero at end of input
    pub length: usize,
}

impl SyntaxError {
    /// Create a new syntax error
    pub fn new(message: impl Into<String>, position: usize, length: usize) -> Self {
        Self {
            message: message.into(),
            position,
            length,
        }
    }

    /// Error positioned at the end of input
    pub fn unexpected_eof(position: usize) -> Self {
        Self::new("Unexpected end of expression", position, 0)
    }

    /// Shift the error position by an offset
    pub fn offset(mut self, by: usize) -> Self {
        self.position += by;
        self
    }
}
