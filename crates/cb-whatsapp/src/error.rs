//! Error types for cb-whatsapp

use thiserror::Error;

/// cb-whatsapp error type
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sidecar API error: {0}")]
    Api(String),

    #[error("Invalid sidecar payload: {0}")]
    InvalidPayload(String),

    #[error("Chatbot error: {0}")]
    Chatbot(#[from] cb_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;
