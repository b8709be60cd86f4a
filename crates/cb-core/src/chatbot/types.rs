//! Chatbot wire types

use serde::{Deserialize, Serialize};

/// Reply sent to the user when the chatbot returns no usable answer
pub const FALLBACK_REPLY: &str = "Sorry, I didn't understand.";

/// Request body POSTed to the chatbot endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub query: String,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

/// Response body from the chatbot endpoint.
///
/// `answer` is kept as raw JSON since the service is not ours; anything other
/// than a non-blank string is treated as "no answer".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub answer: Option<serde_json::Value>,
}

impl QueryResponse {
    /// The answer text, if the service produced one
    pub fn answer_text(&self) -> Option<&str> {
        self.answer
            .as_ref()
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// The text to relay back to the user
    pub fn reply(&self) -> String {
        self.answer_text().unwrap_or(FALLBACK_REPLY).to_string()
    }
}
