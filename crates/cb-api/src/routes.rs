//! Route definitions

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::{health, send_message, session_status};
use crate::middleware::auth::auth_middleware;
use crate::server::AppState;

/// Create the API router
pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/whatsapp/send", post(send_message))
        .route("/api/whatsapp/status", get(session_status))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check
        .route("/health", get(health))
        .merge(protected)
}
