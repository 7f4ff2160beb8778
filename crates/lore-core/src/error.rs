//! Error types for Lore operations

use serde::Serialize;
use thiserror::Error;

/// Unified error type for Lore operations
#[derive(Error, Debug, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum LoreError {
    #[error("IO error: {0}")]
    #[serde(serialize_with = "serialize_io_error")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Chat model error: {0}")]
    Llm(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Extraction error: {0}")]
    Extract(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

fn serialize_io_error<S>(error: &std::io::Error, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&error.to_string())
}

/// Result type alias using LoreError
pub type Result<T> = std::result::Result<T, LoreError>;
