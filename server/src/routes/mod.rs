pub mod health;
pub mod jobs;

use axum::routing::{get, post};
use axum::Router;

use crate::error::ApiError;
use crate::AppState;

/// Everything under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/{tool}/upload", post(jobs::upload))
        .route("/{tool}/status/{job_id}", get(jobs::status))
        .route("/{tool}/download/{job_id}", get(jobs::download))
        .route("/{tool}/log/{job_id}", get(jobs::log))
        .route("/{tool}/limits", get(jobs::limits))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
