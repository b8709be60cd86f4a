//! HTTP API Server
//!
//! Starts and manages the axum-based HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use http::{HeaderValue, Method};
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use cb_core::Config;
use cb_whatsapp::MessagingSession;

use crate::routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<dyn MessagingSession>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(session: Arc<dyn MessagingSession>, api_key: &str) -> Self {
        Self {
            session,
            api_key: Arc::from(api_key),
        }
    }
}

/// Build the CORS layer; permissive unless origins are configured
fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = allowed_origins else {
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::mirror_request())
}

/// Build the application router
pub fn app(state: AppState, allowed_origins: Option<&[String]>) -> Router {
    Router::new()
        .merge(routes(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(allowed_origins)),
        )
        .with_state(state)
}

/// Start the HTTP API server
pub async fn start_server(
    config: &Config,
    session: Arc<dyn MessagingSession>,
) -> anyhow::Result<()> {
    let state = AppState::new(session, config.api_key());
    let app = app(state, config.api.allowed_origins.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Bridge HTTP API running on http://localhost:{}", config.api.port);

    axum::serve(listener, app).await?;

    Ok(())
}
