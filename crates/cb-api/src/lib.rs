//! cb-api: inbound HTTP API for chatbot-bridge
//!
//! Lets the external chatbot service push outbound WhatsApp messages through
//! the bridge's session. Built with axum.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use error::{ApiError, Result};
pub use server::{app, start_server, AppState};
