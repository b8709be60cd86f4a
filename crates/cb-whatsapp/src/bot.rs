//! WhatsApp bridge wrapper
//!
//! Wires the session, its event stream, and the inbound relay together.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use cb_core::{ChatbotClient, Config};

use crate::error::Result;
use crate::events::spawn_event_listener;
use crate::relay::InboundRelay;
use crate::session::{SessionAction, WhatsAppSession};

/// Buffered events between the listener and the dispatcher
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// WhatsApp side of the bridge
pub struct WhatsAppBridge {
    session: Arc<WhatsAppSession>,
    relay: InboundRelay,
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl WhatsAppBridge {
    /// Create the bridge from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let session = Arc::new(WhatsAppSession::new(&config.whatsapp)?);
        let chatbot = ChatbotClient::new(config)?;
        Ok(Self::with_parts(session, chatbot))
    }

    /// Create from an existing session and chatbot client
    pub fn with_parts(session: Arc<WhatsAppSession>, chatbot: ChatbotClient) -> Self {
        let relay = InboundRelay::new(session.clone(), chatbot);
        Self { session, relay }
    }

    /// The session, shared with the outbound HTTP route
    pub fn session(&self) -> Arc<WhatsAppSession> {
        Arc::clone(&self.session)
    }

    /// Connect and process session events until the event stream ends
    pub async fn start(self) -> Result<()> {
        info!("Starting WhatsApp session {}", self.session.sidecar().session_id());

        // The listener starts first so a QR emitted right after connect is not missed
        let (event_tx, mut event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let _listener = AbortOnDrop(spawn_event_listener(
            self.session.sidecar().clone(),
            event_tx,
        ));

        // Connecting runs beside the dispatcher so a slow or absent sidecar
        // never holds up message events
        let mut connector = AbortOnDrop(self.spawn_connect());

        while let Some(event) = event_rx.recv().await {
            match self.session.handle_event(event) {
                Some(SessionAction::Relay(message)) => {
                    let relay = self.relay.clone();
                    tokio::spawn(async move {
                        relay.handle(&message).await;
                    });
                }
                Some(SessionAction::Reconnect) => {
                    if connector.0.is_finished() {
                        connector = AbortOnDrop(self.spawn_connect());
                    }
                }
                None => {}
            }
        }

        info!("WhatsApp event stream closed");
        Ok(())
    }

    fn spawn_connect(&self) -> JoinHandle<()> {
        let session = Arc::clone(&self.session);
        tokio::spawn(async move { session.connect_until_accepted().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::session::MessagingSession;
    use crate::sidecar::SidecarClient;
    use crate::types::ConnectionState;

    #[test]
    fn test_new_requires_chatbot_endpoint() {
        let config = Config::default();
        assert!(WhatsAppBridge::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_start_retries_connect_until_sidecar_answers() {
        let sidecar = MockServer::start().await;
        let chatbot = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/sessions/s1/connect"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&sidecar)
            .await;
        Mock::given(method("POST"))
            .and(path("/sessions/s1/connect"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "state": "open" })),
            )
            .mount(&sidecar)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/events/poll"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&sidecar)
            .await;

        let session = Arc::new(WhatsAppSession::with_sidecar(
            SidecarClient::new(&sidecar.uri(), "s1").unwrap(),
            "auth_s1",
        ));
        let client =
            ChatbotClient::with_endpoint(chatbot.uri(), "secret", Duration::from_secs(5)).unwrap();
        let bridge = WhatsAppBridge::with_parts(session.clone(), client);
        let handle = tokio::spawn(bridge.start());

        let mut state = session.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| s.state == ConnectionState::Open),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(session.is_connected());

        let connects = sidecar
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/sessions/s1/connect")
            .count();
        assert!(connects >= 2);

        handle.abort();
    }

    #[tokio::test]
    async fn test_end_to_end_relay() {
        let sidecar = MockServer::start().await;
        let chatbot = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/sessions/s1/connect"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "state": "open" })),
            )
            .mount(&sidecar)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/events/poll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "type": "connected" },
                {
                    "type": "message",
                    "from": "1@s.whatsapp.net",
                    "message": { "conversation": "ping" }
                }
            ])))
            .up_to_n_times(1)
            .mount(&sidecar)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/events/poll"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&sidecar)
            .await;
        Mock::given(method("POST"))
            .and(path("/sessions/s1/send"))
            .and(body_json(serde_json::json!({ "to": "1@s.whatsapp.net", "text": "pong" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&sidecar)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "answer": "pong" })),
            )
            .mount(&chatbot)
            .await;

        let session = Arc::new(WhatsAppSession::with_sidecar(
            SidecarClient::new(&sidecar.uri(), "s1").unwrap(),
            "auth_s1",
        ));
        let client = ChatbotClient::with_endpoint(
            format!("{}/chat", chatbot.uri()),
            "secret",
            Duration::from_secs(5),
        )
        .unwrap();
        let bridge = WhatsAppBridge::with_parts(session.clone(), client);

        let handle = tokio::spawn(bridge.start());

        let mut state = session.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| s.state == ConnectionState::Open),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(session.is_connected());

        // Give the spawned relay task time to reach the sidecar
        for _ in 0..50 {
            let requests = sidecar.received_requests().await.unwrap_or_default();
            if requests.iter().any(|r| r.url.path() == "/sessions/s1/send") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        handle.abort();
    }
}
