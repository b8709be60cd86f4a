//! Error types for cb-core

use thiserror::Error;

/// Main error type for cb-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Chatbot API error: {0}")]
    ChatbotApi(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for cb-core
pub type Result<T> = std::result::Result<T, Error>;
