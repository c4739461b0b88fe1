//! Config section editing: draft edits, save and reset.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use super::{current_revision, error, parse_config_key, success, ApiResult};
use crate::auth::Session;
use crate::editor::{ConfigView, SaveOutcome};
use crate::models::Document;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FieldValue {
    pub value: Value,
}

/// GET /api/admin/config - Draft of every section with its form.
pub async fn get_config_draft(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<ConfigView> {
    let revision_id = current_revision(&state).await;
    let workspace = state.workspaces.for_session(&session.token).await;
    let mut workspace = workspace.lock().await;
    success(workspace.config_editor().await.view(), revision_id)
}

/// PUT /api/admin/config/:key - Replace a section of the draft.
pub async fn put_config_section(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(key): Path<String>,
    Json(doc): Json<Document>,
) -> ApiResult<ConfigView> {
    let revision_id = current_revision(&state).await;
    let key = match parse_config_key(&key) {
        Ok(key) => key,
        Err(e) => return error(e, revision_id),
    };

    let workspace = state.workspaces.for_session(&session.token).await;
    let mut workspace = workspace.lock().await;
    let editor = workspace.config_editor().await;
    editor.set_section(key, doc);
    success(editor.view(), revision_id)
}

/// PATCH /api/admin/config/:key/:field - Change one field of the draft.
pub async fn patch_config_field(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((key, field)): Path<(String, String)>,
    Json(request): Json<FieldValue>,
) -> ApiResult<ConfigView> {
    let revision_id = current_revision(&state).await;
    let key = match parse_config_key(&key) {
        Ok(key) => key,
        Err(e) => return error(e, revision_id),
    };

    let workspace = state.workspaces.for_session(&session.token).await;
    let mut workspace = workspace.lock().await;
    let editor = workspace.config_editor().await;
    match editor.set_field(key, &field, request.value) {
        Ok(()) => success(editor.view(), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/config/:key/:field/rows - Append a blank row.
pub async fn add_config_row(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((key, field)): Path<(String, String)>,
) -> ApiResult<ConfigView> {
    let revision_id = current_revision(&state).await;
    let key = match parse_config_key(&key) {
        Ok(key) => key,
        Err(e) => return error(e, revision_id),
    };

    let workspace = state.workspaces.for_session(&session.token).await;
    let mut workspace = workspace.lock().await;
    let editor = workspace.config_editor().await;
    match editor.add_row(key, &field) {
        Ok(()) => success(editor.view(), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/admin/config/:key/:field/rows/:index
pub async fn remove_config_row(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((key, field, index)): Path<(String, String, usize)>,
) -> ApiResult<ConfigView> {
    let revision_id = current_revision(&state).await;
    let key = match parse_config_key(&key) {
        Ok(key) => key,
        Err(e) => return error(e, revision_id),
    };

    let workspace = state.workspaces.for_session(&session.token).await;
    let mut workspace = workspace.lock().await;
    let editor = workspace.config_editor().await;
    match editor.remove_row(key, &field, index) {
        Ok(()) => success(editor.view(), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/config/save - Persist every changed section.
pub async fn save_config(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<SaveOutcome> {
    let revision_id = current_revision(&state).await;
    let workspace = state.workspaces.for_session(&session.token).await;
    let mut workspace = workspace.lock().await;

    match workspace.save_config().await {
        Ok(outcome) => {
            let new_revision = current_revision(&state).await;
            success(outcome, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/config/reset - Discard the draft.
pub async fn reset_config(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<ConfigView> {
    let revision_id = current_revision(&state).await;
    let workspace = state.workspaces.for_session(&session.token).await;
    let mut workspace = workspace.lock().await;
    let editor = workspace.config_editor().await;
    editor.reset();
    success(editor.view(), revision_id)
}
