//! Collection editing: modal create/edit, confirmed delete and reorder.
//!
//! Every handler answers with the editor's view after the operation, so the
//! console can re-render from a single response.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use super::{current_revision, error, parse_collection, success, ApiResult};
use crate::auth::Session;
use crate::editor::{CollectionEditor, CollectionView};
use crate::errors::AppError;
use crate::models::{CollectionName, Document};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub from: usize,
    pub to: usize,
}

fn respond(
    editor: &CollectionEditor,
    result: Result<(), AppError>,
    revision_id: i64,
) -> ApiResult<CollectionView> {
    match result {
        Ok(()) => success(editor.view(), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// Apply a synchronous editor operation and answer with the resulting view.
async fn with_editor<F>(
    state: &AppState,
    session: &Session,
    name: &str,
    op: F,
) -> ApiResult<CollectionView>
where
    F: FnOnce(&mut CollectionEditor) -> Result<(), AppError>,
{
    let revision_id = current_revision(state).await;
    let name = match parse_collection(name) {
        Ok(name) => name,
        Err(e) => return error(e, revision_id),
    };

    let workspace = state.workspaces.for_session(&session.token).await;
    let mut workspace = workspace.lock().await;
    let editor = workspace.collection_editor(name).await;
    let result = op(&mut *editor);
    respond(editor, result, revision_id)
}

/// GET /api/admin/collections/:name
pub async fn get_collection_editor(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |_| Ok(())).await
}

/// POST /api/admin/collections/:name/items - Open the modal on a new item.
pub async fn begin_create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |editor| editor.begin_create().map(|_| ())).await
}

/// POST /api/admin/collections/:name/items/:id/edit
pub async fn begin_edit(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((name, id)): Path<(String, String)>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |editor| editor.begin_edit(&id).map(|_| ())).await
}

/// PATCH /api/admin/collections/:name/modal - Change fields of the open item.
pub async fn patch_modal(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
    Json(fields): Json<Document>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |editor| editor.set_fields(fields).map(|_| ())).await
}

/// POST /api/admin/collections/:name/modal/rows/:field - Append a blank row.
pub async fn add_modal_row(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((name, field)): Path<(String, String)>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |editor| editor.add_row(&field).map(|_| ())).await
}

/// DELETE /api/admin/collections/:name/modal/rows/:field/:index
pub async fn remove_modal_row(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((name, field, index)): Path<(String, String, usize)>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |editor| {
        editor.remove_row(&field, index).map(|_| ())
    })
    .await
}

/// POST /api/admin/collections/:name/modal/close
pub async fn close_modal(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |editor| {
        editor.close_modal();
        Ok(())
    })
    .await
}

/// POST /api/admin/collections/:name/items/:id/delete - Ask for confirmation.
pub async fn request_delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((name, id)): Path<(String, String)>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |editor| editor.request_delete(&id)).await
}

/// POST /api/admin/collections/:name/delete/cancel
pub async fn cancel_delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |editor| {
        editor.cancel_delete();
        Ok(())
    })
    .await
}

/// POST /api/admin/collections/:name/drag/start
pub async fn begin_drag(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |editor| editor.begin_drag()).await
}

/// POST /api/admin/collections/:name/drag/move
pub async fn drag_move(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
    Json(request): Json<MoveRequest>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |editor| {
        editor.drag_move(request.from, request.to)
    })
    .await
}

/// POST /api/admin/collections/:name/drag/cancel
pub async fn cancel_drag(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<CollectionView> {
    with_editor(&state, &session, &name, |editor| {
        editor.cancel_drag();
        Ok(())
    })
    .await
}

// Persisting operations go through the workspace so the site cache is
// invalidated on commit.

/// Which persisting operation to run.
enum Commit {
    SaveModal,
    ConfirmDelete,
    FinishDrag,
    Reorder(MoveRequest),
}

async fn commit(
    state: &AppState,
    session: &Session,
    name: &str,
    op: Commit,
) -> ApiResult<CollectionView> {
    let revision_id = current_revision(state).await;
    let name: CollectionName = match parse_collection(name) {
        Ok(name) => name,
        Err(e) => return error(e, revision_id),
    };

    let workspace = state.workspaces.for_session(&session.token).await;
    let mut workspace = workspace.lock().await;
    let result = match op {
        Commit::SaveModal => workspace.save_modal(name).await.map(|_| ()),
        Commit::ConfirmDelete => workspace.confirm_delete(name).await.map(|_| ()),
        Commit::FinishDrag => workspace.finish_drag(name).await,
        Commit::Reorder(request) => workspace.reorder(name, request.from, request.to).await,
    };

    let new_revision = current_revision(state).await;
    respond(workspace.collection_editor(name).await, result, new_revision)
}

/// POST /api/admin/collections/:name/modal/save
pub async fn save_modal(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<CollectionView> {
    commit(&state, &session, &name, Commit::SaveModal).await
}

/// POST /api/admin/collections/:name/delete/confirm
pub async fn confirm_delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<CollectionView> {
    commit(&state, &session, &name, Commit::ConfirmDelete).await
}

/// POST /api/admin/collections/:name/drag/drop
pub async fn finish_drag(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
) -> ApiResult<CollectionView> {
    commit(&state, &session, &name, Commit::FinishDrag).await
}

/// POST /api/admin/collections/:name/reorder - Move one item and persist.
pub async fn reorder(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(name): Path<String>,
    Json(request): Json<MoveRequest>,
) -> ApiResult<CollectionView> {
    commit(&state, &session, &name, Commit::Reorder(request)).await
}

/// POST /api/admin/reload - Drop every uncommitted edit and refetch.
pub async fn reload_workspace(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<()> {
    let revision_id = current_revision(&state).await;
    let workspace = state.workspaces.for_session(&session.token).await;
    workspace.lock().await.reload().await;
    success((), revision_id)
}
