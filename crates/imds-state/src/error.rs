//! Error types for the metadata document engine.

use thiserror::Error;

/// Result type alias for document engine operations.
pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    /// The document could not be parsed, or a patch could not be applied to it.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
}
