//! Authentication middleware
//!
//! Every `/api` route requires the shared key in the `X-API-Key` header.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::server::AppState;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// API key authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if !validate_api_key(provided, Some(&*state.api_key)) {
        warn!(
            path = %request.uri().path(),
            "Rejected request with missing or invalid API key"
        );
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// API key validation.
///
/// An unset or empty expected key rejects everything: the bridge never runs
/// its send route unauthenticated.
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> bool {
    match (provided, expected) {
        (Some(p), Some(e)) if !e.is_empty() => p == e,
        _ => false,
    }
}
