use std::sync::Arc;

use axum::{extract::State, response::Json as JsonResponse};
use chrono::Utc;
use serde::Serialize;

use crate::server::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub status: String,
    pub transcription: bool,
    pub summarization: bool,
    pub uptime_secs: i64,
    pub version: String,
}

pub(crate) async fn health_check(
    State(state): State<Arc<AppState>>,
) -> JsonResponse<HealthResponse> {
    let transcription = state.transcriber.is_some();
    JsonResponse(HealthResponse {
        status: if transcription { "healthy" } else { "degraded" }.to_string(),
        transcription,
        summarization: state.summarizer.is_some(),
        uptime_secs: (Utc::now() - state.app_start_time).num_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
