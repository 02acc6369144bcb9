//! Attachment maintenance routes.

use axum::{extract::State, Json};

use crate::errors::{ApiResponse, AppError};
use crate::models::entry::{DeletedAttachment, RegeneratedAttachment};
use crate::routes::extract::IdPath;
use crate::services::entry as entry_service;
use crate::AppState;

/// POST /api/v1/attachments/{id}/regenerate-url: presign again and persist the new URL.
pub async fn regenerate_url(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<RegeneratedAttachment>>, AppError> {
    let attachment = entry_service::regenerate_attachment_url(&state.db, &state.storage, id).await?;
    Ok(ApiResponse::success(attachment))
}

/// DELETE /api/v1/attachments/{id}: remove the row, then the object.
pub async fn delete(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<DeletedAttachment>>, AppError> {
    let deleted = entry_service::delete_attachment(&state.db, &state.storage, id).await?;
    Ok(ApiResponse::success(deleted))
}
