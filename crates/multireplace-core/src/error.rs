//! Error taxonomy for replace passes.
//!
//! Cancellation is deliberately *not* an error: a cancelled pass returns a
//! partial [`crate::PassSummary`] with [`crate::PassOutcome::Cancelled`].

use thiserror::Error;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum ReplaceError {
    /// Column scoping was requested with an empty delimiter or an invalid
    /// quote character.
    #[error("invalid delimiter: {0}")]
    InvalidDelimiter(&'static str),

    /// A rule's find pattern failed to compile.
    #[error("regex compile error for pattern '{pattern}': {message}")]
    RegexCompile {
        /// The pattern string as the rule specified it.
        pattern: String,
        /// The compiler error message.
        message: String,
    },

    /// The dynamic-replacement evaluator failed.
    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    /// A saved sort permutation no longer matches the document.
    #[error("sort restore failed: {0}")]
    SortRestore(&'static str),
}

/// Failure reported by a pluggable [`crate::Evaluator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    /// Human-readable description of the failure.
    pub message: String,
}

impl ScriptError {
    /// Create a script error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
