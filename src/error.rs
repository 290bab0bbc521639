//! Error types for policy-rag-rs
//!
//! This module provides the error type shared by every stage of the retrieval
//! pipeline: extraction, chunking, embedding, search and generation.

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum RagError {
    /// URL unreachable, timed out, or answered with a non-2xx status
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// URL that is not http(s) or cannot be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Document could not be parsed at all
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Text processing errors
    #[error("Text processing error: {0}")]
    TextProcessing(String),

    /// Embedding model errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector search errors
    #[error("Search error: {0}")]
    Search(String),

    /// Model download or loading errors
    #[error("Model error: {0}")]
    Model(String),

    /// Text generation errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Stuffed prompt does not fit the configured context budget
    #[error("Prompt of {actual} characters exceeds the context budget of {limit} characters")]
    ContextOverflow { actual: usize, limit: usize },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Candle ML framework errors
    #[error("Candle ML error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RagError::Fetch(format!("request timed out: {}", err))
        } else {
            RagError::Fetch(err.to_string())
        }
    }
}

impl From<async_openai::error::OpenAIError> for RagError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        RagError::Generation(err.to_string())
    }
}

impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Generic(err.to_string())
    }
}
