//! Route definitions for the inflow API.

pub mod attachments;
pub mod companies;
pub mod entries;
pub mod extract;
pub mod forms;
pub mod health;
pub mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::AppState;

/// Body of a successful delete.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: i64,
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/companies", post(companies::create).get(companies::list))
        .route(
            "/companies/{id}",
            get(companies::get_by_id)
                .put(companies::update)
                .delete(companies::delete),
        )
        .route("/forms", post(forms::create).get(forms::list))
        .route("/forms/latest", get(forms::latest))
        .route(
            "/forms/{id}",
            get(forms::get_by_id).put(forms::update).delete(forms::delete),
        )
        .route("/forms/{id}/fields", post(forms::create_field))
        .route(
            "/fields/{id}",
            get(forms::get_field)
                .put(forms::update_field)
                .delete(forms::delete_field),
        )
        .route("/entries", post(entries::create).get(entries::list))
        .route("/entries/json", post(entries::create_json))
        .route("/entries/paged", get(entries::list_paged))
        .route("/entries/{id}", get(entries::get_by_id))
        .route(
            "/attachments/{id}/regenerate-url",
            post(attachments::regenerate_url),
        )
        .route("/attachments/{id}", axum::routing::delete(attachments::delete))
        .route("/storage/presign", post(storage::presign))
        .route("/storage/upload", post(storage::upload));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
