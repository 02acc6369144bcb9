//! Entry routes: multipart and URL-only creation, listing and lookup.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};

use crate::errors::{ApiResponse, AppError};
use crate::models::entry::{AttachmentSource, CreateEntryJson, EntryFilters, EntryResult, EntryWithAttachments};
use crate::models::pagination::{PagedResult, Pagination};
use crate::routes::extract::{parse_id, ApiJson, ApiQuery, IdPath};
use crate::services::entry as entry_service;
use crate::services::ingestion::{self, NewEntry};
use crate::AppState;

/// POST /api/v1/entries: create an entry from a multipart form with device files.
///
/// Fields: `company_id`, `form_id`, `payload` (JSON object as text), optional
/// `bank_name` / `bank_account_number`, and any number of `files` (or `file`) parts.
pub async fn create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<EntryResult>>), AppError> {
    let request = read_entry_form(multipart).await?;
    let result = ingestion::create_entry(&state.db, &state.storage, request).await?;
    Ok(ApiResponse::created(result))
}

/// POST /api/v1/entries/json: create an entry referencing already-hosted files.
pub async fn create_json(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateEntryJson>,
) -> Result<(StatusCode, Json<ApiResponse<EntryResult>>), AppError> {
    let result = ingestion::create_entry(&state.db, &state.storage, NewEntry::from(body)).await?;
    Ok(ApiResponse::created(result))
}

/// GET /api/v1/entries: list entries without a total count.
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(pagination): ApiQuery<Pagination>,
    ApiQuery(filters): ApiQuery<EntryFilters>,
) -> Result<Json<ApiResponse<Vec<EntryWithAttachments>>>, AppError> {
    let entries = entry_service::list(&state.db, &filters, &pagination).await?;
    Ok(ApiResponse::success(entries))
}

/// GET /api/v1/entries/paged: list entries with count metadata.
pub async fn list_paged(
    State(state): State<AppState>,
    ApiQuery(pagination): ApiQuery<Pagination>,
    ApiQuery(filters): ApiQuery<EntryFilters>,
) -> Result<Json<ApiResponse<PagedResult<EntryWithAttachments>>>, AppError> {
    let result = entry_service::list_page(&state.db, &filters, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/v1/entries/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<EntryWithAttachments>>, AppError> {
    let entry = entry_service::find_by_id(&state.db, id).await?;
    Ok(ApiResponse::success(entry))
}

async fn read_entry_form(mut multipart: Multipart) -> Result<NewEntry, AppError> {
    let mut company_id: Option<i64> = None;
    let mut form_id: Option<i64> = None;
    let mut payload: Option<serde_json::Value> = None;
    let mut bank_name: Option<String> = None;
    let mut bank_account_number: Option<String> = None;
    let mut attachments = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "files" | "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file '{file_name}': {e}")))?
                    .to_vec();
                attachments.push(AttachmentSource::DeviceFile { file_name, bytes });
            }
            "company_id" | "form_id" | "payload" | "bank_name" | "bank_account_number" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read '{name}': {e}")))?;
                match name.as_str() {
                    "company_id" => company_id = Some(parse_id("company_id", &text)?),
                    "form_id" => form_id = Some(parse_id("form_id", &text)?),
                    "payload" => {
                        payload = Some(serde_json::from_str(&text).map_err(|e| {
                            AppError::BadRequest(format!("payload is not valid JSON: {e}"))
                        })?)
                    }
                    "bank_name" => bank_name = Some(text),
                    _ => bank_account_number = Some(text),
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    Ok(NewEntry {
        company_id: company_id
            .ok_or_else(|| AppError::BadRequest("Missing 'company_id' field".to_string()))?,
        form_id: form_id.ok_or_else(|| AppError::BadRequest("Missing 'form_id' field".to_string()))?,
        payload: payload.ok_or_else(|| AppError::BadRequest("Missing 'payload' field".to_string()))?,
        bank_name,
        bank_account_number,
        attachments,
    })
}
