//! Chatbot HTTP client

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

use super::types::*;

/// Header carrying the shared API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Client for the external chatbot service.
///
/// One POST per query. There is no retry: a failed call is reported to the
/// caller, which decides what the user sees.
#[derive(Debug, Clone)]
pub struct ChatbotClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ChatbotClient {
    /// Create a new chatbot client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config
            .chatbot
            .endpoint
            .clone()
            .ok_or_else(|| Error::Config("chatbot endpoint not set".to_string()))?;

        Self::with_endpoint(
            endpoint,
            config.api_key(),
            Duration::from_secs(config.chatbot.timeout_secs),
        )
    }

    /// Create with an explicit endpoint (for testing or custom deployments)
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a query and return the parsed response
    pub async fn query(&self, query: &str) -> Result<QueryResponse> {
        debug!("Sending query to chatbot: {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&QueryRequest::new(query))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Chatbot API error: {} - {}", status, body);
            return Err(Error::ChatbotApi(format!("{}: {}", status, body)));
        }

        serde_json::from_str(&body).map_err(|e| {
            Error::ChatbotApi(format!("Failed to parse response: {} - {}", e, body))
        })
    }

    /// Send a query and return the text to relay back (answer or fallback)
    pub async fn ask(&self, query: &str) -> Result<String> {
        Ok(self.query(query).await?.reply())
    }
}
