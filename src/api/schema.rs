//! Field schemas used by the admin console to render forms.

use axum::extract::{Path, State};

use super::{current_revision, error, parse_collection, parse_config_key, success, ApiResult};
use crate::editor::EntitySchema;
use crate::AppState;

/// GET /api/admin/schema/config/:key
pub async fn get_config_schema(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<EntitySchema> {
    let revision_id = current_revision(&state).await;

    match parse_config_key(&key) {
        Ok(key) => success(EntitySchema::for_config(key), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/admin/schema/collections/:name
pub async fn get_collection_schema(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<EntitySchema> {
    let revision_id = current_revision(&state).await;

    match parse_collection(&name) {
        Ok(name) => success(EntitySchema::for_collection(name), revision_id),
        Err(e) => error(e, revision_id),
    }
}
