use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use docdesk::Tool;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tools: Vec<&'static str>,
    pub jobs: HashMap<&'static str, usize>,
    pub queued: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        tools: Tool::ALL.iter().map(|t| t.slug()).collect(),
        jobs: state.service.job_counts(),
        queued: state.service.queued(),
    })
}
