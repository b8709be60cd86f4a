//! HTTP client for the WhatsApp session sidecar
//!
//! The sidecar hosts the protocol library (multi-device protocol, QR pairing,
//! credential files). The bridge only drives it over local HTTP.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, WhatsAppError};
use crate::types::{SessionEvent, SessionStatus};

/// Timeout for ordinary sidecar calls
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Long-poll timeout; a bit above the sidecar's own hold time
const POLL_TIMEOUT_SECS: u64 = 70;

/// Sidecar API client bound to one session
#[derive(Debug, Clone)]
pub struct SidecarClient {
    client: Client,
    poll_client: Client,
    base_url: String,
    session_id: String,
}

#[derive(Debug, Serialize)]
struct ConnectPayload<'a> {
    auth_dir: &'a str,
}

#[derive(Debug, Serialize)]
struct SendPayload<'a> {
    to: &'a str,
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SendResponse {
    #[serde(default)]
    message_id: Option<String>,
}

impl SidecarClient {
    /// Create a new sidecar client
    pub fn new(base_url: &str, session_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let poll_client = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            poll_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_id: session_id.to_string(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn url(&self, action: &str) -> String {
        format!("{}/sessions/{}/{}", self.base_url, self.session_id, action)
    }

    /// Ask the sidecar to open (or re-open) the session
    pub async fn connect(&self, auth_dir: &str) -> Result<SessionStatus> {
        info!("Requesting sidecar connect for session {}", self.session_id);

        let response = self
            .client
            .post(self.url("connect"))
            .json(&ConnectPayload { auth_dir })
            .send()
            .await?;

        Self::parse(response).await
    }

    /// Send a text message, returning the platform message id if known
    pub async fn send_text(&self, to: &str, text: &str) -> Result<Option<String>> {
        debug!("Sending WhatsApp message to {}", to);

        let response = self
            .client
            .post(self.url("send"))
            .json(&SendPayload { to, text })
            .send()
            .await?;

        let result: SendResponse = Self::parse(response).await?;
        Ok(result.message_id)
    }

    /// Long-poll for pending session events
    ///
    /// Entries this bridge does not understand are logged and skipped so the
    /// rest of the batch still gets through.
    pub async fn poll_events(&self) -> Result<Vec<SessionEvent>> {
        let response = self.poll_client.get(self.url("events/poll")).send().await?;
        let batch: Vec<Value> = Self::parse(response).await?;

        Ok(batch
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<SessionEvent>(raw.clone()) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = %e, event = %raw, "skipping unrecognized session event");
                    None
                }
            })
            .collect())
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(WhatsAppError::Api(format!("{}: {}", status, body)));
        }

        if body.trim().is_empty() {
            // Some endpoints answer 204 / empty body
            return serde_json::from_str("{}")
                .or_else(|_| serde_json::from_str("[]"))
                .map_err(|e| WhatsAppError::InvalidPayload(e.to_string()));
        }

        serde_json::from_str(&body)
            .map_err(|e| WhatsAppError::InvalidPayload(format!("{} - {}", e, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionState;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_creation() {
        let client = SidecarClient::new("http://127.0.0.1:3001/", "chatbot_session").unwrap();
        assert_eq!(client.session_id(), "chatbot_session");
        assert_eq!(
            client.url("send"),
            "http://127.0.0.1:3001/sessions/chatbot_session/send"
        );
    }

    #[tokio::test]
    async fn test_connect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/s1/connect"))
            .and(body_json(serde_json::json!({ "auth_dir": "auth_s1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "state": "awaiting_qr", "qr": "2@code" }),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = SidecarClient::new(&server.uri(), "s1").unwrap();
        let status = client.connect("auth_s1").await.unwrap();
        assert_eq!(status.state, ConnectionState::AwaitingQr);
        assert_eq!(status.qr.as_deref(), Some("2@code"));
    }

    #[tokio::test]
    async fn test_send_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/s1/send"))
            .and(body_json(serde_json::json!({ "to": "1@s.whatsapp.net", "text": "hey" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "message_id": "ABC" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = SidecarClient::new(&server.uri(), "s1").unwrap();
        let id = client.send_text("1@s.whatsapp.net", "hey").await.unwrap();
        assert_eq!(id.as_deref(), Some("ABC"));
    }

    #[tokio::test]
    async fn test_send_text_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/s1/send"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = SidecarClient::new(&server.uri(), "s1").unwrap();
        assert_eq!(client.send_text("1@s.whatsapp.net", "hey").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_text_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/s1/send"))
            .respond_with(ResponseTemplate::new(500).set_body_string("not connected"))
            .mount(&server)
            .await;

        let client = SidecarClient::new(&server.uri(), "s1").unwrap();
        let err = client.send_text("1@s.whatsapp.net", "hey").await.unwrap_err();
        assert!(matches!(err, WhatsAppError::Api(_)));
    }

    #[tokio::test]
    async fn test_poll_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/events/poll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "type": "connected" }
            ])))
            .mount(&server)
            .await;

        let client = SidecarClient::new(&server.uri(), "s1").unwrap();
        let events = client.poll_events().await.unwrap();
        assert_eq!(events, vec![SessionEvent::Connected]);
    }

    #[tokio::test]
    async fn test_poll_events_skips_unknown_types() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/events/poll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "type": "receipt" },
                {
                    "type": "message",
                    "from": "1@s.whatsapp.net",
                    "message": { "conversation": "hi" }
                },
                { "type": "disconnected", "logged_out": "maybe" }
            ])))
            .mount(&server)
            .await;

        let client = SidecarClient::new(&server.uri(), "s1").unwrap();
        let events = client.poll_events().await.unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            SessionEvent::Message(message) => {
                assert_eq!(message.from, "1@s.whatsapp.net");
                assert_eq!(message.relayable_text(), Some("hi"));
            }
            other => panic!("expected a message event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_events_rejects_non_array_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/events/poll"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"type\":\"connected\"}"))
            .mount(&server)
            .await;

        let client = SidecarClient::new(&server.uri(), "s1").unwrap();
        let err = client.poll_events().await.unwrap_err();
        assert!(matches!(err, WhatsAppError::InvalidPayload(_)));
    }
}
