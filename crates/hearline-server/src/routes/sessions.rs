use std::io::Write;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json as JsonResponse,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use hearline_audio::{ScribeClient, TranscriptionBackend};
use hearline_core::summarize::SessionSummarizer;
use hearline_core::TranscriptSegment;

use crate::batch::{process_audio_file, unique_speakers};
use crate::registry::BatchState;
use crate::server::AppState;

type ApiError = (StatusCode, JsonResponse<Value>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        JsonResponse(json!({"error": message.into()})),
    )
}

fn not_found() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        JsonResponse(json!({"error": "session not found"})),
    )
}

#[derive(Serialize)]
pub(crate) struct TranscribeResponse {
    session_id: String,
    segments: Vec<TranscriptSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Value>,
    duration: f64,
    speakers_detected: usize,
}

struct Upload {
    file: Option<Vec<u8>>,
    chunk_duration: Option<f64>,
    num_speakers: Option<u32>,
    generate_summary: bool,
    api_key: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload {
        file: None,
        chunk_duration: None,
        num_speakers: None,
        generate_summary: true,
        api_key: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read upload: {e}")))?;
                upload.file = Some(bytes.to_vec());
            }
            "chunk_duration" => {
                if let Ok(text) = field.text().await {
                    upload.chunk_duration = text.parse().ok();
                }
            }
            "num_speakers" => {
                if let Ok(text) = field.text().await {
                    upload.num_speakers = text.parse().ok();
                }
            }
            "generate_summary" => {
                if let Ok(text) = field.text().await {
                    upload.generate_summary = text.to_lowercase() != "false";
                }
            }
            "api_key" => {
                if let Ok(text) = field.text().await {
                    if !text.is_empty() {
                        upload.api_key = Some(text);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(upload)
}

/// A per-request key overrides the configured backend, matching the form
/// contract; otherwise the server-wide client is used.
fn resolve_backend(
    state: &AppState,
    api_key: Option<&str>,
) -> Result<Arc<dyn TranscriptionBackend>, ApiError> {
    if let Some(key) = api_key {
        let client = ScribeClient::new(key).map_err(|e| bad_request(e.to_string()))?;
        return Ok(Arc::new(client));
    }
    state.transcriber.clone().ok_or_else(|| {
        bad_request("ELEVEN_API_KEY required (set it in the environment or pass api_key)")
    })
}

fn stage_upload(bytes: &[u8]) -> Result<tempfile::NamedTempFile, ApiError> {
    let mut staged = tempfile::NamedTempFile::new().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            JsonResponse(json!({"error": format!("failed to stage upload: {e}")})),
        )
    })?;
    staged.write_all(bytes).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            JsonResponse(json!({"error": format!("failed to stage upload: {e}")})),
        )
    })?;
    Ok(staged)
}

async fn build_summary(state: &AppState, segments: &[TranscriptSegment]) -> Value {
    let mut summarizer = SessionSummarizer::new(state.summarizer.clone());
    for segment in segments {
        summarizer.add_segment(segment);
    }
    let mut summary = serde_json::Map::new();
    for (key, text) in summarizer.generate_summary().await {
        summary.insert(key, Value::String(text));
    }
    summary.insert(
        "stats".to_string(),
        serde_json::to_value(summarizer.stats()).unwrap_or(Value::Null),
    );
    Value::Object(summary)
}

/// Synchronous transcription of an uploaded audio file with speaker
/// diarization. The staged upload is removed on success and on every error
/// path alike.
pub(crate) async fn transcribe_file(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<JsonResponse<TranscribeResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let bytes = upload.file.as_deref().ok_or_else(|| bad_request("file field is required"))?;
    let backend = resolve_backend(&state, upload.api_key.as_deref())?;

    let session_id = state.registry.new_session_id();
    let staged = stage_upload(bytes)?;

    let segments = process_audio_file(
        staged.path(),
        backend,
        state.config.sample_rate,
        state.config.capture_block_ms,
        upload.chunk_duration.unwrap_or(state.config.chunk_duration_secs),
        upload.num_speakers.unwrap_or(state.config.num_speakers),
    )
    .await
    .map_err(|e| {
        error!("transcription of upload failed: {e:#}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            JsonResponse(json!({"error": e.to_string()})),
        )
    })?;

    let summary = if upload.generate_summary && !segments.is_empty() {
        Some(build_summary(&state, &segments).await)
    } else {
        None
    };

    let duration = segments.iter().map(|s| s.end_time).fold(0.0, f64::max);
    let speakers = unique_speakers(&segments);

    info!(
        "transcribed upload {}: {} segments, {} speakers",
        session_id,
        segments.len(),
        speakers.len()
    );

    Ok(JsonResponse(TranscribeResponse {
        session_id,
        segments,
        summary,
        duration,
        speakers_detected: speakers.len(),
    }))
}

/// Asynchronous transcription: returns a session id immediately and
/// processes in the background; poll `/session/{id}` for progress.
pub(crate) async fn transcribe_stream(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<JsonResponse<Value>, ApiError> {
    let upload = read_upload(multipart).await?;
    let bytes = upload.file.as_deref().ok_or_else(|| bad_request("file field is required"))?;
    let backend = resolve_backend(&state, upload.api_key.as_deref())?;

    let session_id = state.registry.new_session_id();
    let staged = stage_upload(bytes)?;
    let staged_path = staged.into_temp_path();

    state.registry.insert_batch(&session_id);

    let registry = state.registry.clone();
    let config = state.config.clone();
    let chunk_duration = upload.chunk_duration.unwrap_or(config.chunk_duration_secs);
    let num_speakers = upload.num_speakers.unwrap_or(config.num_speakers);
    let task_session_id = session_id.clone();

    tokio::spawn(async move {
        let result = process_audio_file(
            &staged_path,
            backend,
            config.sample_rate,
            config.capture_block_ms,
            chunk_duration,
            num_speakers,
        )
        .await;

        match result {
            Ok(segments) => {
                let speakers = unique_speakers(&segments);
                registry.complete_batch(&task_session_id, segments, speakers);
            }
            Err(e) => {
                error!("background transcription {task_session_id} failed: {e:#}");
                registry.fail_batch(&task_session_id, e.to_string());
            }
        }
        // staged upload removed here regardless of outcome
        drop(staged_path);
    });

    Ok(JsonResponse(json!({
        "session_id": session_id,
        "status": "processing",
        "check_status": format!("/session/{session_id}"),
        "get_transcript": format!("/session/{session_id}/transcript"),
    })))
}

pub(crate) async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<JsonResponse<Value>, ApiError> {
    let session = state.registry.get_batch(&session_id).ok_or_else(not_found)?;
    Ok(JsonResponse(json!({
        "session_id": session_id,
        "status": session.state,
        "created_at": session.created_at,
        "segments_count": session.segments.len(),
        "speakers": session.speakers,
    })))
}

/// The transcript is only available once processing finished: a session that
/// is still running reports 425, distinct from 404 for an unknown id.
pub(crate) async fn get_session_transcript(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<JsonResponse<Value>, ApiError> {
    let session = state.registry.get_batch(&session_id).ok_or_else(not_found)?;

    if session.state == BatchState::Processing {
        return Err((
            StatusCode::TOO_EARLY,
            JsonResponse(json!({"error": "session still processing, check back later"})),
        ));
    }

    Ok(JsonResponse(json!({
        "session_id": session_id,
        "status": session.state,
        "segments": session.segments,
        "speakers": session.speakers,
        "error": session.error,
    })))
}

pub(crate) async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<JsonResponse<Value>, ApiError> {
    if !state.registry.remove_batch(&session_id) {
        return Err(not_found());
    }
    Ok(JsonResponse(json!({
        "message": "session deleted",
        "session_id": session_id,
    })))
}

pub(crate) async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> JsonResponse<Value> {
    let sessions: Vec<Value> = state
        .registry
        .list_batch()
        .into_iter()
        .map(|(id, session)| {
            json!({
                "session_id": id,
                "status": session.state,
                "created_at": session.created_at,
                "segments_count": session.segments.len(),
            })
        })
        .collect();

    JsonResponse(json!({
        "total": sessions.len(),
        "sessions": sessions,
    }))
}
