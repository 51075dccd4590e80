//! Error types for models and collections.

use crate::value::Key;
use thiserror::Error;

/// Main error type for model and collection operations.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Key not found: {0}")]
    NotFound(Key),

    #[error("Index out of range: {index} (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Duplicate key: {0}")]
    DuplicateKey(Key),

    #[error("Invalid primary key value: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::Serialization(e.to_string())
    }
}

/// Result type for model and collection operations.
pub type Result<T> = std::result::Result<T, ModelError>;
