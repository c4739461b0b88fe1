//! Sign-in, sign-out and session lookup.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;

use super::{current_revision, error, success, ApiResult};
use crate::auth::{token_from_headers, Session};
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub secret: String,
}

/// POST /api/auth/sign-in
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> ApiResult<Session> {
    let revision_id = current_revision(&state).await;

    match state.auth.sign_in(&request.email, &request.secret).await {
        Ok(session) => success(session, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/auth/sign-out
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;

    match token_from_headers(&headers) {
        Some(token) => success(state.auth.sign_out(&token).await, revision_id),
        None => error(
            AppError::Unauthorized("Missing session token".to_string()),
            revision_id,
        ),
    }
}

/// GET /api/auth/session - The caller's session, or null when signed out.
pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Option<Session>> {
    let revision_id = current_revision(&state).await;

    let session = match token_from_headers(&headers) {
        Some(token) => state.auth.session(&token).await,
        None => None,
    };
    success(session, revision_id)
}
