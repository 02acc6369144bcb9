//! Form schema routes: forms and their custom fields.

use axum::{extract::State, http::StatusCode, Json};

use crate::errors::{ApiResponse, AppError};
use crate::models::form::{
    CreateField, CreateForm, FormField, FormFilters, FormPair, FormWithFields, UpdateField,
    UpdateForm,
};
use crate::models::pagination::Pagination;
use crate::routes::extract::{ApiJson, ApiQuery, IdPath};
use crate::routes::Deleted;
use crate::services::form as form_service;
use crate::AppState;

/// POST /api/v1/forms: create a form together with its fields.
pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateForm>,
) -> Result<(StatusCode, Json<ApiResponse<FormWithFields>>), AppError> {
    let form = form_service::create_form(&state.db, &body).await?;
    Ok(ApiResponse::created(form))
}

/// GET /api/v1/forms: list forms, most recently updated first.
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(pagination): ApiQuery<Pagination>,
    ApiQuery(filters): ApiQuery<FormFilters>,
) -> Result<Json<ApiResponse<Vec<FormWithFields>>>, AppError> {
    let forms = form_service::list(&state.db, &filters, &pagination).await?;
    Ok(ApiResponse::success(forms))
}

/// GET /api/v1/forms/latest?flow_type=INFLOW&mode=CASH
pub async fn latest(
    State(state): State<AppState>,
    ApiQuery(pair): ApiQuery<FormPair>,
) -> Result<Json<ApiResponse<FormWithFields>>, AppError> {
    let form = form_service::find_latest(&state.db, pair.flow_type, pair.mode).await?;
    Ok(ApiResponse::success(form))
}

/// GET /api/v1/forms/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<FormWithFields>>, AppError> {
    let form = form_service::find_by_id(&state.db, id).await?;
    Ok(ApiResponse::success(form))
}

/// PUT /api/v1/forms/{id}: partial update.
pub async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ApiJson(body): ApiJson<UpdateForm>,
) -> Result<Json<ApiResponse<FormWithFields>>, AppError> {
    let form = form_service::update_form(&state.db, id, &body).await?;
    Ok(ApiResponse::success(form))
}

/// DELETE /api/v1/forms/{id}: fields cascade.
pub async fn delete(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<Deleted>>, AppError> {
    form_service::delete_form(&state.db, id).await?;
    Ok(ApiResponse::success(Deleted { id }))
}

/// POST /api/v1/forms/{id}/fields
pub async fn create_field(
    State(state): State<AppState>,
    IdPath(form_id): IdPath,
    ApiJson(body): ApiJson<CreateField>,
) -> Result<(StatusCode, Json<ApiResponse<FormField>>), AppError> {
    let field = form_service::create_field(&state.db, form_id, &body).await?;
    Ok(ApiResponse::created(field))
}

/// GET /api/v1/fields/{id}
pub async fn get_field(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<FormField>>, AppError> {
    let field = form_service::find_field(&state.db, id).await?;
    Ok(ApiResponse::success(field))
}

/// PUT /api/v1/fields/{id}: partial update.
pub async fn update_field(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ApiJson(body): ApiJson<UpdateField>,
) -> Result<Json<ApiResponse<FormField>>, AppError> {
    let field = form_service::update_field(&state.db, id, &body).await?;
    Ok(ApiResponse::success(field))
}

/// DELETE /api/v1/fields/{id}
pub async fn delete_field(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<Deleted>>, AppError> {
    form_service::delete_field(&state.db, id).await?;
    Ok(ApiResponse::success(Deleted { id }))
}
