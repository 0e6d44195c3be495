use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    response::Json as JsonResponse,
    routing::get,
    routing::post,
    serve, Router,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use hearline_audio::{ScribeClient, TranscriptionBackend};
use hearline_core::summarize::{ChatCompletionBackend, SummaryBackend};
use hearline_core::Config;

use crate::registry::SessionRegistry;
use crate::routes::{health, sessions, websocket};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    /// Absent when no transcription credential is configured; the server
    /// still comes up degraded so health checks and listings work.
    pub transcriber: Option<Arc<dyn TranscriptionBackend>>,
    pub summarizer: Option<Arc<dyn SummaryBackend>>,
    pub app_start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let transcriber: Option<Arc<dyn TranscriptionBackend>> =
            match ScribeClient::new(&config.scribe_api_key) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!("transcription disabled: {}", e);
                    None
                }
            };

        let summarizer: Option<Arc<dyn SummaryBackend>> = config
            .summary_api_key
            .as_deref()
            .and_then(|key| match ChatCompletionBackend::new(key, &config.summary_model) {
                Ok(backend) => Some(Arc::new(backend) as Arc<dyn SummaryBackend>),
                Err(e) => {
                    warn!("ai summaries disabled: {}", e);
                    None
                }
            });

        AppState {
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new()),
            transcriber,
            summarizer,
            app_start_time: Utc::now(),
        }
    }
}

async fn root() -> JsonResponse<serde_json::Value> {
    JsonResponse(json!({
        "message": "hearline transcription api",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "endpoints": {
            "transcribe": "POST /transcribe",
            "transcribe_async": "POST /transcribe/stream",
            "get_session": "GET /session/{session_id}",
            "get_transcript": "GET /session/{session_id}/transcript",
            "list_sessions": "GET /sessions",
            "stream": "WS /ws/transcribe",
            "list_streams": "GET /ws/sessions",
        },
    }))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::health_check))
        .route("/transcribe", post(sessions::transcribe_file))
        .route("/transcribe/stream", post(sessions::transcribe_stream))
        .route(
            "/session/:session_id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/session/:session_id/transcript",
            get(sessions::get_session_transcript),
        )
        .route("/sessions", get(sessions::list_sessions))
        .route("/ws/transcribe", get(websocket::ws_transcribe_handler))
        .route("/ws/sessions", get(websocket::list_live_sessions))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct Server {
    state: Arc<AppState>,
    addr: SocketAddr,
}

impl Server {
    pub fn new(state: Arc<AppState>, addr: SocketAddr) -> Self {
        Server { state, addr }
    }

    pub async fn start(self) -> Result<(), std::io::Error> {
        let app = create_router(self.state);
        info!("starting server on {}", self.addr);
        serve(TcpListener::bind(self.addr).await?, app.into_make_service()).await
    }
}
