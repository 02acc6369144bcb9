//! Company registry routes: CRUD with bank-account reconciliation.

use axum::{extract::State, http::StatusCode, Json};

use crate::errors::{ApiResponse, AppError};
use crate::models::company::{CompanyWithAccounts, CreateCompany, UpdateCompany};
use crate::models::pagination::{PagedResult, Pagination};
use crate::routes::extract::{ApiJson, ApiQuery, IdPath};
use crate::routes::Deleted;
use crate::services::company as company_service;
use crate::AppState;

/// POST /api/v1/companies: create a company with its bank accounts.
pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateCompany>,
) -> Result<(StatusCode, Json<ApiResponse<CompanyWithAccounts>>), AppError> {
    let company = company_service::create(&state.db, &body).await?;
    Ok(ApiResponse::created(company))
}

/// GET /api/v1/companies: list companies, newest first.
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ApiResponse<PagedResult<CompanyWithAccounts>>>, AppError> {
    let result = company_service::list(&state.db, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/v1/companies/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<CompanyWithAccounts>>, AppError> {
    let company = company_service::find_by_id(&state.db, id).await?;
    Ok(ApiResponse::success(company))
}

/// PUT /api/v1/companies/{id}: rename and/or replace the bank-account list.
pub async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ApiJson(body): ApiJson<UpdateCompany>,
) -> Result<Json<ApiResponse<CompanyWithAccounts>>, AppError> {
    let company = company_service::update(&state.db, id, &body).await?;
    Ok(ApiResponse::success(company))
}

/// DELETE /api/v1/companies/{id}
pub async fn delete(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<Deleted>>, AppError> {
    company_service::delete(&state.db, id).await?;
    Ok(ApiResponse::success(Deleted { id }))
}
