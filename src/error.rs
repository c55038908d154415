//! Error types for the finance assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, FinBriefError>;

#[derive(Error, Debug)]
pub enum FinBriefError {

    // =============================
    // Turn Pipeline Errors
    // =============================

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =============================
    // Collaborator Errors
    // =============================

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("News feed error: {0}")]
    NewsFeed(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
