use std::sync::Arc;

use axum::extract::State;
use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Bearer-token auth for the ingest surface: `Authorization: Bearer <token>`
/// must match the configured ingest token exactly.
pub async fn require_bearer_token(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == state.config.ingest_token => Ok(next.run(request).await),
        _ => Err(ApiError::Auth),
    }
}
