//! cb-whatsapp: WhatsApp side of chatbot-bridge
//!
//! This crate drives a WhatsApp session hosted by a protocol sidecar and
//! relays inbound user messages to the external chatbot service.

pub mod bot;
pub mod error;
pub mod events;
pub mod qr;
pub mod relay;
pub mod session;
pub mod sidecar;
pub mod types;

pub use bot::WhatsAppBridge;
pub use error::{Result, WhatsAppError};
pub use relay::{InboundRelay, RelayOutcome, ERROR_REPLY};
pub use session::{MessagingSession, SessionAction, StateSnapshot, WhatsAppSession};
pub use sidecar::SidecarClient;
pub use types::{ConnectionState, InboundMessage, MessageContent, SessionEvent, SessionStatus};
