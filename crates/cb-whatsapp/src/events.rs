//! Event listener for the sidecar's long-poll event stream.
//!
//! Polls `/sessions/{id}/events/poll` and forwards each event to an mpsc
//! channel. Transport errors reconnect with exponential backoff.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::WhatsAppError;
use crate::sidecar::SidecarClient;
use crate::types::SessionEvent;

/// Initial reconnect backoff (milliseconds)
pub(crate) const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum reconnect backoff (milliseconds)
const MAX_BACKOFF_MS: u64 = 30_000;

/// Spawn an event listener that forwards events to the given channel.
///
/// The task ends when the receiving side of `event_tx` is dropped.
pub fn spawn_event_listener(
    sidecar: SidecarClient,
    event_tx: mpsc::Sender<SessionEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        info!(session = sidecar.session_id(), "listening for WhatsApp session events");

        loop {
            match sidecar.poll_events().await {
                Ok(events) => {
                    backoff_ms = INITIAL_BACKOFF_MS;
                    for event in events {
                        debug!(?event, "received session event");
                        if event_tx.send(event).await.is_err() {
                            info!("event receiver dropped, stopping listener");
                            return;
                        }
                    }
                }
                // Long-poll expired with nothing to report
                Err(WhatsAppError::Http(e)) if e.is_timeout() => continue,
                Err(e) => {
                    if event_tx.is_closed() {
                        return;
                    }
                    warn!(error = %e, backoff_ms, "session event stream error, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = next_backoff(backoff_ms);
                }
            }
        }
    })
}

pub(crate) fn next_backoff(current_ms: u64) -> u64 {
    current_ms.saturating_mul(2).min(MAX_BACKOFF_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(next_backoff(1_000), 2_000);
        assert_eq!(next_backoff(16_000), 30_000);
        assert_eq!(next_backoff(30_000), 30_000);
    }

    #[tokio::test]
    async fn test_listener_forwards_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/events/poll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "type": "qr", "code": "2@abc" },
                { "type": "connected" }
            ])))
            .mount(&server)
            .await;

        let sidecar = SidecarClient::new(&server.uri(), "s1").unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = spawn_event_listener(sidecar, tx);

        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Qr { code: "2@abc".to_string() })
        );
        assert_eq!(rx.recv().await, Some(SessionEvent::Connected));

        drop(rx);
        handle.abort();
    }

    #[tokio::test]
    async fn test_listener_keeps_known_events_beside_unknown_ones() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/events/poll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "type": "receipt" },
                {
                    "type": "message",
                    "from": "1@s.whatsapp.net",
                    "message": { "conversation": "hi" }
                }
            ])))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let sidecar = SidecarClient::new(&server.uri(), "s1").unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = spawn_event_listener(sidecar, tx);

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        match event {
            Some(SessionEvent::Message(message)) => {
                assert_eq!(message.from, "1@s.whatsapp.net");
                assert_eq!(message.relayable_text(), Some("hi"));
            }
            other => panic!("expected a message event, got {:?}", other),
        }

        drop(rx);
        handle.abort();
    }
}
