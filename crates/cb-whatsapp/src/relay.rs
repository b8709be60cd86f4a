//! Inbound relay: WhatsApp user -> chatbot -> WhatsApp user

use std::sync::Arc;

use tracing::{error, info};

use cb_core::ChatbotClient;

use crate::error::Result;
use crate::session::MessagingSession;
use crate::types::InboundMessage;

/// Sent to the user when the chatbot call or the reply send fails
pub const ERROR_REPLY: &str = "Error talking to chatbot.";

/// What happened to an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Own message, or no text to relay
    Ignored,
    /// The chatbot reply (or the fallback) was delivered
    Replied(String),
    /// The relay failed and the user was sent [`ERROR_REPLY`]
    ErrorReported,
    /// The relay failed and even the error message could not be sent
    Undelivered,
}

/// Forwards inbound user text to the chatbot and sends its answer back
#[derive(Clone)]
pub struct InboundRelay {
    session: Arc<dyn MessagingSession>,
    chatbot: ChatbotClient,
}

impl InboundRelay {
    pub fn new(session: Arc<dyn MessagingSession>, chatbot: ChatbotClient) -> Self {
        Self { session, chatbot }
    }

    /// Relay one inbound message
    pub async fn handle(&self, message: &InboundMessage) -> RelayOutcome {
        let Some(text) = message.relayable_text() else {
            return RelayOutcome::Ignored;
        };
        let from = message.from.as_str();

        info!(from, text, "📩 incoming message");

        match self.forward(from, text).await {
            Ok(reply) => RelayOutcome::Replied(reply),
            Err(e) => {
                error!("Error talking to chatbot for {}: {}", from, e);
                match self.session.send_text(from, ERROR_REPLY).await {
                    Ok(()) => RelayOutcome::ErrorReported,
                    Err(e) => {
                        error!("Failed to send error reply to {}: {}", from, e);
                        RelayOutcome::Undelivered
                    }
                }
            }
        }
    }

    async fn forward(&self, from: &str, text: &str) -> Result<String> {
        let reply = self.chatbot.ask(text).await?;
        self.session.send_text(from, &reply).await?;
        Ok(reply)
    }
}
