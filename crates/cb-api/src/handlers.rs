//! HTTP API handlers
//!
//! Outbound relay: lets the chatbot service push messages through the session.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{ApiError, Result};
use crate::server::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

/// Send request payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Recipient JID
    pub to: String,
    /// Message text
    pub text: String,
    /// Must match the bridge's session identifier
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Send response payload
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendResponse {
    pub status: String,
}

/// Session status response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub session_id: String,
    pub state: String,
    pub connected: bool,
    /// When the current state was entered (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
}

/// Generic API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handler functions
// ============================================================================

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Send a WhatsApp message through the session
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>> {
    let session = &state.session;

    if !session.is_connected() || req.session_id.as_deref() != Some(session.session_id()) {
        return Err(ApiError::NotConnected);
    }

    if let Err(e) = session.send_text(&req.to, &req.text).await {
        error!("Send error: {}", e);
        return Err(ApiError::SendFailed(e));
    }

    info!("Outbound message sent to {}", req.to);
    Ok(Json(SendResponse {
        status: "sent".to_string(),
    }))
}

/// Report the session's connection state
pub async fn session_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let session = &state.session;
    let current = session.state();

    Json(StatusResponse {
        session_id: session.session_id().to_string(),
        state: current.to_string(),
        connected: session.is_connected(),
        since: session.state_since().map(|t| t.to_rfc3339()),
    })
}
