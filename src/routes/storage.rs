//! Direct object-storage routes: pre-upload and URL regeneration.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};

use crate::errors::{ApiResponse, AppError};
use crate::models::entry::PresignRequest;
use crate::routes::extract::ApiJson;
use crate::storage::IssuedUrl;
use crate::AppState;

const DEFAULT_FOLDER: &str = "uploads";

/// POST /api/v1/storage/presign: fresh presigned URL for a stored URL or key.
pub async fn presign(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PresignRequest>,
) -> Result<Json<ApiResponse<IssuedUrl>>, AppError> {
    if body.url.trim().is_empty() {
        return Err(AppError::BadRequest("url must not be empty".to_string()));
    }
    let issued = state.storage.regenerate_presigned_url(&body.url).await?;
    Ok(ApiResponse::success(issued))
}

/// POST /api/v1/storage/upload: upload one `file` part, optionally into `folder`.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<IssuedUrl>>), AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut folder = DEFAULT_FOLDER.to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" | "files" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?
                    .to_vec();
                file = Some((file_name, bytes));
            }
            "folder" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read folder: {e}")))?;
                folder = normalize_folder(&text)?;
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| AppError::BadRequest("Missing 'file' field in multipart request".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest(format!("File '{file_name}' is empty")));
    }

    let issued = state.storage.upload(bytes, &file_name, &folder).await?;
    Ok(ApiResponse::created(issued))
}

/// Trim slashes and reject empty or parent-directory segments.
fn normalize_folder(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(DEFAULT_FOLDER.to_string());
    }
    if trimmed.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(AppError::BadRequest(format!("Invalid folder '{raw}'")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_defaults_and_trims() {
        assert_eq!(normalize_folder("  ").unwrap(), "uploads");
        assert_eq!(normalize_folder("/receipts/2025/").unwrap(), "receipts/2025");
    }

    #[test]
    fn folder_rejects_traversal() {
        assert!(normalize_folder("a/../b").is_err());
        assert!(normalize_folder("a//b").is_err());
    }
}
