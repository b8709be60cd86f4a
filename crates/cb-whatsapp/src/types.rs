//! Session sidecar wire types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of the WhatsApp session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Sidecar is opening the connection
    #[default]
    Connecting,
    /// Waiting for the QR code to be scanned
    AwaitingQr,
    /// Connected and able to send
    Open,
    /// Connection dropped; a reconnect has been or will be requested
    Closed,
    /// Credentials were revoked from the phone; needs a fresh QR pairing
    LoggedOut,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::AwaitingQr => "awaiting_qr",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::LoggedOut => "logged_out",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status reported by the sidecar for a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    /// Pending pairing QR payload, present while awaiting a scan
    #[serde(default)]
    pub qr: Option<String>,
}

/// Message content as delivered by the protocol library.
///
/// Plain chats arrive as `conversation`; replies, links and quoted messages
/// arrive as an extended text message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageContent {
    #[serde(default)]
    pub conversation: Option<String>,
    #[serde(default)]
    pub extended_text: Option<String>,
}

impl MessageContent {
    /// Text body of the message, if it has one
    pub fn text(&self) -> Option<&str> {
        self.conversation
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.extended_text.as_deref().filter(|s| !s.is_empty()))
    }
}

/// An incoming message event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundMessage {
    /// Remote JID of the chat the message arrived in
    pub from: String,
    /// Sent by this account (from another linked device)
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub message_id: Option<String>,
    /// Absent for protocol/system messages
    #[serde(default)]
    pub message: Option<MessageContent>,
}

impl InboundMessage {
    /// Text worth relaying, or `None` when the message should be ignored
    pub fn relayable_text(&self) -> Option<&str> {
        if self.from_me {
            return None;
        }
        self.message.as_ref().and_then(MessageContent::text)
    }
}

/// Event emitted by the sidecar's event stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A new pairing QR code is available
    Qr { code: String },
    /// The session is open
    Connected,
    /// The connection closed
    Disconnected {
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        logged_out: bool,
    },
    /// A message was received
    Message(InboundMessage),
}
