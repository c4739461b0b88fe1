//! Account management, administrator only.

use axum::{extract::State, Json};
use serde::Deserialize;

use super::{current_revision, error, success, ApiResult};
use crate::auth::{Account, Role};
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub email: String,
    pub secret: String,
    pub role: String,
}

/// GET /api/admin/accounts
pub async fn list_accounts(State(state): State<AppState>) -> ApiResult<Vec<Account>> {
    let revision_id = current_revision(&state).await;

    match state.auth.list_accounts().await {
        Ok(accounts) => success(accounts, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/accounts
pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> ApiResult<Account> {
    let revision_id = current_revision(&state).await;

    let Some(role) = Role::from_str(&request.role) else {
        return error(
            AppError::Validation(format!("Unknown role {}", request.role)),
            revision_id,
        );
    };

    match state
        .auth
        .create_account(&request.email, &request.secret, role)
        .await
    {
        Ok(account) => {
            let new_revision = current_revision(&state).await;
            success(account, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
