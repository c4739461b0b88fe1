//! REST API module.
//!
//! Public site reads, session endpoints, and the admin editing surface.

mod accounts;
mod collections;
mod config_editor;
mod content;
mod notifications;
mod schema;
mod session;

pub use accounts::*;
pub use collections::*;
pub use config_editor::*;
pub use content::*;
pub use notifications::*;
pub use schema::*;
pub use session::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{CollectionName, ConfigKey};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    Err(crate::errors::AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Store write counter reported in every envelope; 0 if the store is unreachable.
async fn current_revision(state: &AppState) -> i64 {
    state.store.revision().await.unwrap_or(0)
}

fn parse_config_key(raw: &str) -> Result<ConfigKey, AppError> {
    ConfigKey::from_str(raw)
        .ok_or_else(|| AppError::NotFound(format!("Unknown config section {}", raw)))
}

fn parse_collection(raw: &str) -> Result<CollectionName, AppError> {
    CollectionName::from_str(raw)
        .ok_or_else(|| AppError::NotFound(format!("Unknown collection {}", raw)))
}
