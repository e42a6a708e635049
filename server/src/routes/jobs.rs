//! Per-tool job endpoints. Each handler parses the tool slug, delegates to the
//! service and translates the outcome into HTTP.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use docdesk::jobs::{StatusResponse, UploadResponse};
use docdesk::{SourceFile, Tool, ToolLimits};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Multipart field names accepted for uploaded files.
const FILE_FIELDS: [&str; 2] = ["files", "files[]"];

#[derive(Debug, Serialize)]
pub struct LimitsResponse {
    pub tool: &'static str,
    pub name: &'static str,
    #[serde(flatten)]
    pub limits: ToolLimits,
}

pub async fn upload(
    State(state): State<AppState>,
    Path(tool): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let tool: Tool = tool.parse()?;

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if !field.name().is_some_and(|name| FILE_FIELDS.contains(&name)) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        // browsers send an empty part when no file was picked
        if filename.is_empty() && bytes.is_empty() {
            continue;
        }
        files.push(SourceFile::new(&filename, content_type, bytes.to_vec()));
    }

    let batch = state.service.validator(tool).accept(files)?;
    let files_count = batch.len();
    let job_id = state.service.submit(batch)?;

    Ok(Json(UploadResponse {
        job_id,
        message: format!("{} file(s) queued for {}", files_count, tool.display_name()),
        files_count,
    }))
}

pub async fn status(
    State(state): State<AppState>,
    Path((tool, job_id)): Path<(String, String)>,
) -> ApiResult<Json<StatusResponse>> {
    let tool: Tool = tool.parse()?;
    let snapshot = state.service.status(tool, &job_id)?;
    Ok(Json(StatusResponse::from(&snapshot)))
}

pub async fn download(
    State(state): State<AppState>,
    Path((tool, job_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let tool: Tool = tool.parse()?;
    let service = Arc::clone(&state.service);

    let archive = tokio::task::spawn_blocking(move || service.package(tool, &job_id))
        .await
        .map_err(|e| ApiError::internal(format!("Archive read task failed: {}", e)))??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", archive.filename),
            ),
        ],
        archive.bytes,
    )
        .into_response())
}

pub async fn log(
    State(state): State<AppState>,
    Path((tool, job_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let tool: Tool = tool.parse()?;
    let text = state.service.log(tool, &job_id)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", tool.log_name()),
            ),
        ],
        text,
    )
        .into_response())
}

pub async fn limits(
    State(state): State<AppState>,
    Path(tool): Path<String>,
) -> ApiResult<Json<LimitsResponse>> {
    let tool: Tool = tool.parse()?;
    Ok(Json(LimitsResponse {
        tool: tool.slug(),
        name: tool.display_name(),
        limits: state.service.limits(tool).clone(),
    }))
}
