//! Notification queue endpoints.

use axum::extract::{Path, State};

use super::{current_revision, error, success, ApiResult};
use crate::errors::AppError;
use crate::notifications::Notification;
use crate::AppState;

/// GET /api/admin/notifications - Queued notifications, oldest first.
pub async fn list_notifications(State(state): State<AppState>) -> ApiResult<Vec<Notification>> {
    let revision_id = current_revision(&state).await;
    success(state.notifications.snapshot(), revision_id)
}

/// DELETE /api/admin/notifications/:id
pub async fn dismiss_notification(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let revision_id = current_revision(&state).await;

    if state.notifications.dismiss(id) {
        success((), revision_id)
    } else {
        error(
            AppError::NotFound(format!("Notification {} not found", id)),
            revision_id,
        )
    }
}
